//! The salted hash used for action IDs.
//!
//! Every [Hash] starts with a salt derived from the toolchain version (see
//! [BuildConfig::hash_salt]). This makes sure different toolchain versions
//! never address the same cache entries, so a bug in one version cannot
//! affect the execution of another. Build outputs themselves are still
//! addressed by unsalted sha256, see [crate::filehash].
use bstr::ByteSlice;
use lazy_static::lazy_static;
use sha2::{Digest, Sha256};
use actionid_tracing::HASH_DEBUG_TARGET;
use tracing::debug;

use crate::config::BuildConfig;

/// Size of all digests produced by this crate.
pub const HASH_SIZE: usize = 32;

/// Environment variable enabling the hash debug output.
pub const DEBUG_HASH_ENV: &str = "DEBUG_HASH";

lazy_static! {
    static ref DEBUG_HASH: bool = std::env::var_os(DEBUG_HASH_ENV).is_some_and(|v| !v.is_empty());
}

/// Returns whether `DEBUG_HASH` was set (to a non-empty value) when it was
/// first queried in this process.
pub fn debug_hash_enabled() -> bool {
    *DEBUG_HASH
}

/// A salted sha256 hash session.
///
/// If created with `debug` set, every write and the final digest are emitted
/// as tracing events on the `actionid::hash` target, tagged with the name of
/// the session. This never influences the digest.
pub struct Hash {
    hasher: Sha256,
    name: String,
    debug: bool,
}

impl Hash {
    pub fn new(config: &BuildConfig, name: &str, debug: bool) -> Self {
        let mut h = Hash {
            hasher: Sha256::new(),
            name: name.to_string(),
            debug,
        };
        if h.debug {
            debug!(target: HASH_DEBUG_TARGET, hash_name = %h.name, "HASH[{}]", h.name);
        }

        h.write(config.hash_salt());
        h
    }

    pub fn write(&mut self, b: &[u8]) {
        if self.debug {
            debug!(target: HASH_DEBUG_TARGET, hash_name = %self.name, "HASH[{}] {:?}", self.name, b.as_bstr());
        }
        self.hasher.update(b);
    }

    /// Writes formatted text, so records can be written with [write!] and
    /// [writeln!]. Each call is a single write.
    pub fn write_fmt(&mut self, args: std::fmt::Arguments<'_>) {
        match args.as_str() {
            Some(s) => self.write(s.as_bytes()),
            None => self.write(args.to_string().as_bytes()),
        }
    }

    /// Finalizes the session and returns the digest.
    pub fn sum(self) -> [u8; HASH_SIZE] {
        let out: [u8; HASH_SIZE] = self.hasher.finalize().into();
        if self.debug {
            debug!(
                target: HASH_DEBUG_TARGET,
                hash_name = %self.name,
                "HASH[{}] {}",
                self.name,
                data_encoding::HEXLOWER.encode(&out)
            );
        }
        out
    }
}

/// Runs `f` with a subscriber collecting all events up to `DEBUG` level, and
/// returns the result of `f` along with the formatted events.
#[cfg(test)]
pub(crate) fn capture_events<R>(f: impl FnOnce() -> R) -> (R, String) {
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    let out = tracing::subscriber::with_default(subscriber, f);
    let events = String::from_utf8_lossy(&captured.0.lock()).into_owned();
    (out, events)
}
