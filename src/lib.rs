//! gpgsym - interactive symmetric encryption of short messages through gpg
//!
//! The passphrase reaches gpg through an inherited pipe descriptor, never
//! through argv, the environment, or a file.

#[cfg(not(unix))]
compile_error!("gpgsym hands the passphrase to gpg over an inherited descriptor and requires Unix");

pub mod console;
pub mod error;
pub mod interaction;
pub mod invoker;
pub mod locator;
pub mod palette;
pub mod passphrase;
