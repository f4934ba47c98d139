//! Passphrase reading functionality

use crate::error::{ErrorCategory, ErrorKind, GpgsymError, Result};
use std::collections::VecDeque;
use std::io::{self, IsTerminal};
use zeroize::Zeroizing;

/// Trait for reading passphrases from various sources
pub trait PassphraseReader {
    /// Show `prompt` and read one passphrase as arbitrary bytes.
    ///
    /// Returns the passphrase wrapped in `Zeroizing` to ensure it is securely
    /// wiped from memory when dropped.
    fn read_passphrase(&mut self, prompt: &str) -> Result<Zeroizing<Vec<u8>>>;
}

/// Reads passphrase from terminal with no echo
pub struct TerminalPassphraseReader;

impl TerminalPassphraseReader {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TerminalPassphraseReader {
    fn default() -> Self {
        Self::new()
    }
}

impl PassphraseReader for TerminalPassphraseReader {
    /// Read passphrase from terminal.
    ///
    /// Note: Terminal input is limited to UTF-8 due to rpassword library constraints.
    fn read_passphrase(&mut self, prompt: &str) -> Result<Zeroizing<Vec<u8>>> {
        if !io::stdin().is_terminal() {
            return Err(GpgsymError::with_kind(
                ErrorCategory::User,
                ErrorKind::PassphraseUnavailable,
                "cannot read passphrase from terminal - stdin is not a terminal \
                 (use --passphrase-stdin)",
            ));
        }

        // Note: rpassword returns String (UTF-8 only), not zeroized
        let passphrase = rpassword::prompt_password(prompt).map_err(|e| {
            GpgsymError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::PassphraseUnavailable,
                format!("failure reading passphrase: {}", e),
                e,
            )
        })?;

        Ok(Zeroizing::new(passphrase.into_bytes()))
    }
}

/// Hands out a fixed sequence of passphrases, one per call (for testing)
pub struct ScriptedPassphraseReader {
    queue: VecDeque<Zeroizing<Vec<u8>>>,
    prompts: Vec<String>,
}

impl ScriptedPassphraseReader {
    pub fn new<I, P>(passphrases: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Vec<u8>>,
    {
        Self {
            queue: passphrases
                .into_iter()
                .map(|p| Zeroizing::new(p.into()))
                .collect(),
            prompts: Vec::new(),
        }
    }

    /// Prompts shown so far, in order.
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }
}

impl PassphraseReader for ScriptedPassphraseReader {
    fn read_passphrase(&mut self, prompt: &str) -> Result<Zeroizing<Vec<u8>>> {
        self.prompts.push(prompt.to_string());
        self.queue.pop_front().ok_or_else(|| {
            GpgsymError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::PassphraseUnavailable,
                "scripted passphrases exhausted",
            )
        })
    }
}
