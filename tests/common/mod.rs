//! Shared fixtures: a shell stand-in for gpg.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Honors the slice of the gpg command line that gpgsym relies on.
///
/// "Encryption" wraps the message in armor lines and tags it with a
/// checksum of the passphrase read from `--passphrase-fd`. Decryption with
/// a different passphrase prints nothing to stdout and exits 2, as gpg
/// does. Every argv is appended to `argv.log` next to the script.
pub const FAKE_GPG: &str = r#"#!/bin/sh
log="$(dirname "$0")/argv.log"
printf '%s\n' "$@" >> "$log"
echo "--" >> "$log"

mode=""
fd=""
while [ $# -gt 0 ]; do
    case "$1" in
        --symmetric|-c) mode=encrypt ;;
        --decrypt|-d) mode=decrypt ;;
        --passphrase-fd) shift; fd="$1" ;;
    esac
    shift
done

if [ -z "$fd" ]; then
    echo "gpg: no passphrase descriptor given" >&2
    exit 2
fi
key=$(cat <&"$fd" | cksum | cut -d' ' -f1)

case "$mode" in
    encrypt)
        printf '%s\n%s\n' '-----BEGIN PGP MESSAGE-----' "$key"
        cat
        printf '\n%s\n' '-----END PGP MESSAGE-----'
        ;;
    decrypt)
        body=$(cat)
        given=$(printf '%s\n' "$body" | sed -n 2p)
        if [ "$given" != "$key" ]; then
            echo "gpg: decryption failed: Bad session key" >&2
            exit 2
        fi
        printf '%s' "$(printf '%s\n' "$body" | sed '1,2d;$d')"
        ;;
    *)
        echo "gpg: no command given" >&2
        exit 2
        ;;
esac
"#;

/// Write the fake tool into `dir` under `name` and make it executable.
pub fn install_fake_gpg(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, FAKE_GPG).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Argument vectors recorded by the fake tool in `dir`, one per run.
pub fn recorded_argvs(dir: &Path) -> Vec<Vec<String>> {
    let log = fs::read_to_string(dir.join("argv.log")).unwrap_or_default();
    let mut runs = Vec::new();
    let mut current = Vec::new();
    for line in log.lines() {
        if line == "--" {
            runs.push(std::mem::take(&mut current));
        } else {
            current.push(line.to_string());
        }
    }
    runs
}
