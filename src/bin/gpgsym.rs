//! gpgsym CLI - interactive passphrase-based message encryption
//!
//! Prompts for a message and a passphrase, then runs gpg (or gpg2) in
//! batch mode with the passphrase supplied over a pipe.

use clap::Parser;
use std::io::{self, IsTerminal};
use std::process;

use gpgsym::interaction::{InteractionLoop, PassphraseSource};
use gpgsym::invoker::SecureInvoker;
use gpgsym::locator;
use gpgsym::palette::Palette;
use gpgsym::passphrase::TerminalPassphraseReader;

#[derive(Parser)]
#[command(name = "gpgsym")]
#[command(version)]
#[command(
    about = "Symmetrically encrypt or decrypt a message with gpg.",
    long_about = "Run with no arguments to get an interactive prompt. \
                  The passphrase is handed to gpg over a pipe and never \
                  written to disk."
)]
struct Cli {
    /// Disable colored output
    #[arg(long, alias = "no-color")]
    nocolor: bool,

    /// Read passphrases as plain lines from stdin instead of from the terminal
    #[arg(long)]
    passphrase_stdin: bool,
}

fn main() {
    pretty_env_logger::init();
    let cli = Cli::parse();
    let palette = Palette::new(!cli.nocolor);

    let binding = match locator::locate() {
        Ok(binding) => binding,
        Err(e) => {
            eprintln!("{}", (palette.error)(&format!("Error! {}", e)));
            process::exit(1);
        }
    };
    let invoker = SecureInvoker::new(binding);

    let passphrases = match PassphraseSource::select(
        cli.passphrase_stdin,
        io::stdin().is_terminal(),
        || Box::new(TerminalPassphraseReader::new()),
    ) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("{}", (palette.error)(&format!("Error! {}", e)));
            process::exit(1);
        }
    };

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut ui = InteractionLoop::new(
        stdin.lock(),
        stdout.lock(),
        palette,
        passphrases,
        &invoker,
    );

    if let Err(e) = ui.run() {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}
