//! Deterministic derivation of action IDs: content fingerprints identifying
//! everything that goes into compiling one package, usable as build cache
//! keys.
mod actionid;
mod errors;

pub mod buildid;
pub mod config;
pub mod filehash;
pub mod hash;
pub mod package;

pub use actionid::{derive_action_id, ActionId, Deriver};
pub use buildid::{find_and_hash, hash_to_string};
pub use config::BuildConfig;
pub use errors::Error;
pub use filehash::{FileHasher, FileSource, OsFileSource};
pub use hash::Hash;
pub use package::{Action, Module, Package};
