//! Output styling, chosen once at startup

use colored::{ColoredString, Colorize};

pub type Style = fn(&str) -> ColoredString;

/// One styling function per semantic role. Every styled string resets
/// itself, so there is no separate reset role.
#[derive(Clone, Copy)]
pub struct Palette {
    /// Prompts and menu text.
    pub bold: Style,
    /// Failures and the key letters of the menu.
    pub error: Style,
    /// Instructions.
    pub info: Style,
    /// Result headers.
    pub success: Style,
    /// Encrypted or decrypted message bodies.
    pub data: Style,
    colored: bool,
}

impl Palette {
    pub fn new(use_color: bool) -> Self {
        if use_color {
            Self::colored()
        } else {
            Self::plain()
        }
    }

    pub fn colored() -> Self {
        Self {
            bold: |s| s.bold(),
            error: |s| s.red().bold(),
            info: |s| s.blue().bold(),
            success: |s| s.green().bold(),
            data: |s| s.cyan(),
            colored: true,
        }
    }

    pub fn plain() -> Self {
        Self {
            bold: |s| s.normal(),
            error: |s| s.normal(),
            info: |s| s.normal(),
            success: |s| s.normal(),
            data: |s| s.normal(),
            colored: false,
        }
    }
}

impl std::fmt::Debug for Palette {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Palette")
            .field("colored", &self.colored)
            .finish_non_exhaustive()
    }
}
