//! Build IDs embedded into compiled artifacts.
//!
//! Contains the compact string encoding of digests used inside build IDs,
//! and [find_and_hash], which hashes an artifact while ignoring the build ID
//! embedded in it.
use data_encoding::BASE64URL_NOPAD;

use crate::hash::HASH_SIZE;

mod scan;
#[cfg(feature = "async")]
mod scan_async;

pub use scan::{find_and_hash, DEFAULT_BUF_SIZE};
#[cfg(feature = "async")]
pub use scan_async::find_and_hash_async;

/// Number of leading digest bytes kept by [hash_to_string] (120 bits).
const ENCODED_BYTES: usize = 15;

/// Length of strings returned by [hash_to_string].
pub const ENCODED_LEN: usize = 20;

/// Converts a digest to the string recorded in build IDs.
///
/// Only the first 120 bits are kept, encoded with the URL-safe base64
/// alphabet (`A-Z a-z 0-9 - _`), which results in a 20 character string.
/// This is enough to detect the need to rebuild an installed artifact, but
/// it is lossy: cache lookups must compare full digests.
pub fn hash_to_string(digest: &[u8; HASH_SIZE]) -> String {
    // 15 bytes are a multiple of 3, so there is no padding.
    BASE64URL_NOPAD.encode(&digest[..ENCODED_BYTES])
}
