//! The interactive encrypt/decrypt loop
//!
//! States: `Menu -> {Encrypting, Decrypting} -> Menu`, ending in `Quit`.
//! Operational failures are printed and the loop goes back to the menu;
//! only console I/O failures escape `run`.

use crate::console::{console_io, expect_one_of, multiline_input, read_line};
use crate::error::{ErrorCategory, ErrorKind, GpgsymError, Result};
use crate::invoker::{InvocationResult, Invoke, Mode};
use crate::palette::Palette;
use crate::passphrase::PassphraseReader;
use std::fmt;
use std::io::{BufRead, Write};
use zeroize::Zeroizing;

/// Ends a message to be encrypted. Not part of the message.
pub const ENCRYPT_SENTINEL: &str = ";;;";

/// Last line of an armored OpenPGP message. Kept in the payload.
pub const PGP_FOOTER: &str = "-----END PGP MESSAGE-----";

const MENU_CHOICES: [&str; 4] = ["e", "d", "q", "Q"];
const RETRY_CHOICES: [&str; 4] = ["y", "n", "Y", "N"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Menu,
    Encrypting,
    Decrypting,
    Quit,
}

/// One user command: what to do, to which text, with which passphrase.
///
/// Running the session consumes it, so the passphrase is wiped as soon as
/// the child process is done with it.
pub struct Session<'a> {
    mode: Mode,
    payload: &'a str,
    passphrase: Zeroizing<Vec<u8>>,
}

impl<'a> Session<'a> {
    pub fn new(mode: Mode, payload: &'a str, passphrase: Zeroizing<Vec<u8>>) -> Self {
        Self {
            mode,
            payload,
            passphrase,
        }
    }

    pub fn run(self, invoker: &dyn Invoke) -> Result<InvocationResult> {
        invoker.invoke(self.mode, &self.passphrase, self.payload.as_bytes())
    }
}

impl fmt::Debug for Session<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("mode", &self.mode)
            .field("payload_len", &self.payload.len())
            .field("passphrase", &"<redacted>")
            .finish()
    }
}

/// Where passphrases come from.
pub enum PassphraseSource {
    /// A dedicated reader, normally the masked terminal prompt.
    Reader(Box<dyn PassphraseReader>),
    /// Plain lines from the same input stream as everything else.
    Inline,
}

impl PassphraseSource {
    /// Pick the source for this process, refusing combinations that cannot
    /// work or would echo the secret.
    ///
    /// The masked prompt needs stdin to be a terminal; inline passphrases
    /// are only allowed when it is not one.
    pub fn select(
        inline_requested: bool,
        stdin_is_terminal: bool,
        terminal: impl FnOnce() -> Box<dyn PassphraseReader>,
    ) -> Result<Self> {
        match (inline_requested, stdin_is_terminal) {
            (true, false) => Ok(PassphraseSource::Inline),
            (false, true) => Ok(PassphraseSource::Reader(terminal())),
            (true, true) => Err(GpgsymError::with_kind(
                ErrorCategory::User,
                ErrorKind::PassphraseUnavailable,
                "--passphrase-stdin would echo the passphrase on this terminal",
            )),
            (false, false) => Err(GpgsymError::with_kind(
                ErrorCategory::User,
                ErrorKind::PassphraseUnavailable,
                "stdin is not a terminal, so the passphrase cannot be read \
                 without echo (use --passphrase-stdin)",
            )),
        }
    }
}

pub struct InteractionLoop<'a, R, W> {
    input: R,
    output: W,
    palette: Palette,
    passphrases: PassphraseSource,
    invoker: &'a dyn Invoke,
}

impl<'a, R: BufRead, W: Write> InteractionLoop<'a, R, W> {
    pub fn new(
        input: R,
        output: W,
        palette: Palette,
        passphrases: PassphraseSource,
        invoker: &'a dyn Invoke,
    ) -> Self {
        Self {
            input,
            output,
            palette,
            passphrases,
            invoker,
        }
    }

    /// Run until the user quits or input ends.
    pub fn run(&mut self) -> Result<()> {
        let mut state = State::Menu;
        while state != State::Quit {
            state = self.step(state)?;
        }
        Ok(())
    }

    /// Perform the work of one state and return the next one.
    pub fn step(&mut self, state: State) -> Result<State> {
        match state {
            State::Menu => self.menu(),
            State::Encrypting => self.encrypt(),
            State::Decrypting => self.decrypt(),
            State::Quit => Ok(State::Quit),
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn menu(&mut self) -> Result<State> {
        let p = self.palette;
        writeln!(
            self.output,
            "{}{}{}{}{}{}{}",
            (p.bold)("["),
            (p.error)("e"),
            (p.bold)("]ncrypt, ["),
            (p.error)("d"),
            (p.bold)("]ecrypt, or ["),
            (p.error)("q"),
            (p.bold)("]uit?"),
        )
        .map_err(console_io("write to stdout"))?;
        self.show_prompt(&(p.bold)(": ").to_string())?;

        let Some(first) = read_line(&mut self.input)? else {
            return Ok(State::Quit);
        };
        let choice = expect_one_of(
            &mut self.input,
            &mut self.output,
            &self.palette,
            first,
            &MENU_CHOICES,
        )?;
        Ok(match choice.as_deref() {
            Some("e") => State::Encrypting,
            Some("d") => State::Decrypting,
            _ => State::Quit,
        })
    }

    fn encrypt(&mut self) -> Result<State> {
        let p = self.palette;
        writeln!(
            self.output,
            "{}{}",
            (p.info)(
                "Type or paste message to be encrypted.\n\
                 End with line containing only a triple-semicolon, i.e. "
            ),
            (p.bold)(ENCRYPT_SENTINEL),
        )
        .map_err(console_io("write to stdout"))?;
        self.show_prompt(&(p.info)(":").to_string())?;

        let Some(payload) = multiline_input(&mut self.input, ENCRYPT_SENTINEL, false)? else {
            return Ok(State::Quit);
        };
        self.blank_line()?;

        let passphrase = match self.read_passphrase(true) {
            Ok(Some(passphrase)) => passphrase,
            Ok(None) => return Ok(State::Quit),
            Err(e) if e.kind == Some(ErrorKind::PassphraseUnavailable) => {
                self.report_error(e.with_context("encryption aborted"))?;
                return Ok(State::Menu);
            }
            Err(e) => return Err(e),
        };

        match Session::new(Mode::Encrypt, &payload, passphrase).run(self.invoker) {
            Ok(result) if result.success => {
                writeln!(
                    self.output,
                    "{}\n\n{}",
                    (p.success)("\nEncrypted message follows:"),
                    (p.data)(&result.output_text()),
                )
                .map_err(console_io("write to stdout"))?;
            }
            Ok(result) => self.report_failure("Error in encryption process!", &result)?,
            Err(e) => self.report_error(e.with_context("encryption aborted"))?,
        }
        Ok(State::Menu)
    }

    fn decrypt(&mut self) -> Result<State> {
        let p = self.palette;
        writeln!(
            self.output,
            "{}",
            (p.info)("Paste GPG-encrypted message to be decrypted.")
        )
        .map_err(console_io("write to stdout"))?;
        self.show_prompt(&(p.info)(":").to_string())?;

        let Some(payload) = multiline_input(&mut self.input, PGP_FOOTER, true)? else {
            return Ok(State::Quit);
        };
        self.blank_line()?;

        loop {
            let passphrase = match self.read_passphrase(false) {
                Ok(Some(passphrase)) => passphrase,
                Ok(None) => return Ok(State::Quit),
                Err(e) if e.kind == Some(ErrorKind::PassphraseUnavailable) => {
                    self.report_error(e.with_context("decryption aborted"))?;
                    return Ok(State::Menu);
                }
                Err(e) => return Err(e),
            };

            let session = Session::new(Mode::Decrypt, &payload, passphrase);
            let result = match session.run(self.invoker) {
                Ok(result) => result,
                Err(e) => {
                    self.report_error(e.with_context("decryption aborted"))?;
                    return Ok(State::Menu);
                }
            };

            if result.success {
                writeln!(
                    self.output,
                    "{}\n\n{}\n",
                    (p.success)("\nDecrypted message follows:"),
                    (p.data)(&result.output_text()),
                )
                .map_err(console_io("write to stdout"))?;
                return Ok(State::Menu);
            }

            self.report_failure("Error in decryption process!", &result)?;
            self.show_prompt(
                &(p.bold)("Try again with a different passphrase? [y/n]: ").to_string(),
            )?;
            let Some(first) = read_line(&mut self.input)? else {
                return Ok(State::Quit);
            };
            match expect_one_of(
                &mut self.input,
                &mut self.output,
                &self.palette,
                first,
                &RETRY_CHOICES,
            )?
            .as_deref()
            {
                Some("y") | Some("Y") => continue,
                Some(_) => return Ok(State::Menu),
                None => return Ok(State::Quit),
            }
        }
    }

    /// Ask for a non-empty passphrase, twice when `confirm` is set, until
    /// both entries match.
    fn read_passphrase(&mut self, confirm: bool) -> Result<Option<Zeroizing<Vec<u8>>>> {
        let p = self.palette;
        loop {
            let Some(mut first) =
                self.read_secret(&(p.info)("Carefully enter passphrase: ").to_string())?
            else {
                return Ok(None);
            };
            while first.is_empty() {
                match self.read_secret(&(p.error)("You must enter a passphrase: ").to_string())? {
                    Some(again) => first = again,
                    None => return Ok(None),
                }
            }
            if !confirm {
                return Ok(Some(first));
            }

            let Some(second) =
                self.read_secret(&(p.info)("Repeat passphrase to confirm: ").to_string())?
            else {
                return Ok(None);
            };
            if *first == *second {
                return Ok(Some(first));
            }
            writeln!(
                self.output,
                "{}",
                (p.error)("The passphrases you entered did not match")
            )
            .map_err(console_io("write to stdout"))?;
        }
    }

    fn read_secret(&mut self, prompt: &str) -> Result<Option<Zeroizing<Vec<u8>>>> {
        if let PassphraseSource::Reader(reader) = &mut self.passphrases {
            return reader.read_passphrase(prompt).map(Some);
        }
        self.show_prompt(prompt)?;
        Ok(read_line(&mut self.input)?.map(|line| Zeroizing::new(line.into_bytes())))
    }

    fn report_failure(&mut self, headline: &str, result: &InvocationResult) -> Result<()> {
        let p = self.palette;
        writeln!(self.output, "{}", (p.error)(headline)).map_err(console_io("write to stdout"))?;
        let diagnostics = result.diagnostics_text();
        let diagnostics = diagnostics.trim_end();
        if !diagnostics.is_empty() {
            writeln!(self.output, "{}", (p.info)(diagnostics))
                .map_err(console_io("write to stdout"))?;
        }
        Ok(())
    }

    /// Print an operation that was abandoned before producing a result.
    fn report_error(&mut self, err: GpgsymError) -> Result<()> {
        let p = self.palette;
        let text = match err.source_error() {
            Some(source) => format!("{}: {}", err.message(), source),
            None => err.message().to_string(),
        };
        writeln!(self.output, "{}", (p.error)(&text)).map_err(console_io("write to stdout"))?;
        // User errors are all raised before the child is spawned.
        if err.category == ErrorCategory::User {
            writeln!(self.output, "{}", (p.info)("Nothing was sent to gpg."))
                .map_err(console_io("write to stdout"))?;
        }
        Ok(())
    }

    fn show_prompt(&mut self, prompt: &str) -> Result<()> {
        write!(self.output, "{}", prompt).map_err(console_io("write to stdout"))?;
        self.output.flush().map_err(console_io("flush stdout"))
    }

    fn blank_line(&mut self) -> Result<()> {
        writeln!(self.output).map_err(console_io("write to stdout"))
    }
}
