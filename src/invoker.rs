//! Running gpg with the passphrase delivered over a pipe
//!
//! The passphrase never reaches argv, the environment, or the filesystem.
//! For each call:
//!
//! 1. an anonymous pipe is opened and the passphrase is written into it;
//! 2. the write end is closed, so the child sees EOF right after the secret;
//! 3. gpg is spawned with `--passphrase-fd N`, where `N` is the read end,
//!    the only descriptor of ours that survives exec;
//! 4. the payload is streamed into the child's stdin while its stdout and
//!    stderr are collected;
//! 5. the read end is closed once the child has been reaped.
//!
//! Every descriptor is an owned handle, so each early return releases it.

use crate::error::{ErrorCategory, ErrorKind, GpgsymError, Result};
use crate::locator::ToolBinding;
use std::borrow::Cow;
use std::io::{self, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Output, Stdio};
use std::thread;

/// Largest passphrase accepted. The secret is written before the child
/// exists, so it has to fit in the pipe buffer. POSIX only promises
/// `PIPE_BUF` (512 bytes) of atomicity and nothing about capacity; Linux
/// pipes hold at least one page, which covers this.
pub const MAX_PASSPHRASE_LEN: usize = 4096;

const COMMON_FLAGS: [&str; 3] = ["--batch", "--no-tty", "--yes"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Encrypt,
    Decrypt,
}

impl Mode {
    fn flags(self) -> &'static [&'static str] {
        match self {
            Mode::Encrypt => &["--armor", "--symmetric", "--force-mdc"],
            Mode::Decrypt => &["--decrypt"],
        }
    }
}

/// What came back from one run of the external tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationResult {
    /// Exit status was success and, when decrypting, output was non-empty.
    pub success: bool,
    /// Everything the child wrote to stdout.
    pub output: Vec<u8>,
    /// Everything the child wrote to stderr.
    pub diagnostics: Vec<u8>,
    /// `None` when the child was killed by a signal.
    pub exit_code: Option<i32>,
}

impl InvocationResult {
    pub fn output_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.output)
    }

    pub fn diagnostics_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.diagnostics)
    }
}

/// One encrypt or decrypt round trip through an external tool.
///
/// `Ok` with `success == false` means the tool ran and rejected the
/// input (typically a wrong passphrase). `Err` means the tool could not be
/// run at all.
pub trait Invoke {
    fn invoke(&self, mode: Mode, passphrase: &[u8], input: &[u8]) -> Result<InvocationResult>;
}

/// Builds the argument vector passed to the tool (program name excluded).
pub fn build_args(binding: &ToolBinding, mode: Mode, passphrase_fd: RawFd) -> Vec<String> {
    let mut args = binding.prefix().to_vec();
    args.extend(COMMON_FLAGS.iter().map(|s| s.to_string()));
    args.extend(mode.flags().iter().map(|s| s.to_string()));
    args.push("--passphrase-fd".to_string());
    args.push(passphrase_fd.to_string());
    args
}

/// Stateless invoker bound to the tool found at startup.
#[derive(Debug, Clone)]
pub struct SecureInvoker {
    binding: ToolBinding,
}

impl SecureInvoker {
    pub fn new(binding: ToolBinding) -> Self {
        Self { binding }
    }
}

impl Invoke for SecureInvoker {
    fn invoke(&self, mode: Mode, passphrase: &[u8], input: &[u8]) -> Result<InvocationResult> {
        if passphrase.len() > MAX_PASSPHRASE_LEN {
            return Err(GpgsymError::with_kind(
                ErrorCategory::User,
                ErrorKind::PassphraseTooLong,
                format!("passphrase longer than {} bytes", MAX_PASSPHRASE_LEN),
            ));
        }

        let (reader, mut writer) = io::pipe().map_err(|e| {
            log::warn!("passphrase pipe creation failed: {}", e);
            GpgsymError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::PipeSetup,
                format!("failed to create passphrase pipe: {}", e),
                e,
            )
        })?;
        writer.write_all(passphrase).map_err(|e| {
            GpgsymError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::PipeSetup,
                format!("failed to write passphrase pipe: {}", e),
                e,
            )
        })?;
        drop(writer);

        let passphrase_fd = reader.as_raw_fd();
        let args = build_args(&self.binding, mode, passphrase_fd);
        log::debug!(
            "spawning {} {}",
            self.binding.program().display(),
            args.join(" ")
        );

        let mut command = Command::new(self.binding.program());
        command
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // SAFETY: the hook runs between fork and exec and only calls fcntl,
        // which is async-signal-safe. It touches no memory of the parent.
        unsafe {
            command.pre_exec(move || inherit_across_exec(passphrase_fd));
        }

        let child = command.spawn().map_err(|e| {
            log::warn!(
                "failed to start {}: {}",
                self.binding.program().display(),
                e
            );
            GpgsymError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Spawn,
                format!(
                    "failed to start {}: {}",
                    self.binding.program().display(),
                    e
                ),
                e,
            )
        })?;

        let collected = feed_and_collect(child, input);
        // The child has been reaped (or collection failed); release our copy.
        drop(reader);
        let output = collected?;

        let success =
            output.status.success() && (mode == Mode::Encrypt || !output.stdout.is_empty());
        log::debug!(
            "{} exited with {}, {} bytes of output",
            self.binding.variant().binary_name(),
            output.status,
            output.stdout.len()
        );
        if !success && !output.stderr.is_empty() {
            log::debug!("gpg stderr: {}", String::from_utf8_lossy(&output.stderr).trim_end());
        }

        Ok(InvocationResult {
            success,
            exit_code: output.status.code(),
            output: output.stdout,
            diagnostics: output.stderr,
        })
    }
}

/// Clears close-on-exec so the descriptor is still open in the new image.
fn inherit_across_exec(fd: RawFd) -> io::Result<()> {
    // SAFETY: fcntl on an integer descriptor has no memory-safety
    // preconditions; failure is reported through the return value.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags == -1 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: as above.
    if unsafe { libc::fcntl(fd, libc::F_SETFD, flags & !libc::FD_CLOEXEC) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Streams `input` into the child while draining stdout and stderr, then
/// waits for it to exit.
///
/// Feeding happens on a scoped thread so a child that writes before it has
/// read everything cannot deadlock against us. The thread is joined before
/// returning.
fn feed_and_collect(mut child: Child, input: &[u8]) -> Result<Output> {
    let stdin = child.stdin.take();

    let (output, fed) = thread::scope(|scope| {
        let feeder = scope.spawn(move || -> io::Result<()> {
            if let Some(mut stdin) = stdin {
                stdin.write_all(input)?;
                stdin.flush()?;
            }
            Ok(())
        });
        let output = child.wait_with_output();
        let fed = feeder
            .join()
            .unwrap_or_else(|_| Err(io::Error::other("stdin feeder panicked")));
        (output, fed)
    });

    let output = output.map_err(|e| {
        GpgsymError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::ChildIo,
            format!("failed to collect gpg output: {}", e),
            e,
        )
    })?;

    match fed {
        Ok(()) => {}
        // The child exited without reading everything; its status says why.
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            log::debug!("gpg closed stdin before consuming all input");
        }
        Err(e) => {
            return Err(GpgsymError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::ChildIo,
                format!("failed to write to gpg stdin: {}", e),
                e,
            ));
        }
    }

    Ok(output)
}
