//! Derivation of action IDs.
//!
//! An action ID identifies all inputs of compiling one package: toolchain,
//! platform, flags, the contents of all source files, and the identities of
//! all dependencies. It is calculated by writing one newline-terminated
//! record per input into a salted [Hash], in a fixed order. The order is
//! part of the format, changing it changes all action IDs.
use data_encoding::HEXLOWER;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, Span};

use crate::buildid::hash_to_string;
use crate::config::BuildConfig;
use crate::filehash::{FileHasher, FileSource, OsFileSource};
use crate::hash::{debug_hash_enabled, Hash, HASH_SIZE};
use crate::package::{Action, Package};
use crate::Error;

/// The fingerprint of all inputs of an [Action].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId([u8; HASH_SIZE]);

impl ActionId {
    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    /// Returns the truncated encoding used inside build IDs, see
    /// [hash_to_string].
    pub fn to_build_id_string(&self) -> String {
        hash_to_string(&self.0)
    }
}

impl From<[u8; HASH_SIZE]> for ActionId {
    fn from(value: [u8; HASH_SIZE]) -> Self {
        Self(value)
    }
}

impl From<ActionId> for [u8; HASH_SIZE] {
    fn from(value: ActionId) -> Self {
        value.0
    }
}

impl TryFrom<&[u8]> for ActionId {
    type Error = Error;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        value
            .try_into()
            .map(Self)
            .map_err(|_| Error::InvalidDigestLen(value.len()))
    }
}

impl AsRef<[u8]> for ActionId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Display for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&HEXLOWER.encode(&self.0))
    }
}

impl std::fmt::Debug for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ActionId({})", HEXLOWER.encode(&self.0))
    }
}

/// Derives action IDs for a build session.
///
/// Dependencies are identified by their content ID. If a content ID was
/// registered with [Deriver::with_output_id] (usually the digest of the
/// dependency's build output), that one is used. Otherwise, the
/// dependency's own action ID is derived recursively.
///
/// Registered content IDs are looked up by import path, so they apply to
/// every action of that import path in the graph.
pub struct Deriver<'a, S = OsFileSource> {
    config: &'a BuildConfig,
    files: &'a FileHasher<S>,
    output_ids: HashMap<String, [u8; HASH_SIZE]>,
    debug: bool,
}

impl<'a, S: FileSource> Deriver<'a, S> {
    pub fn new(config: &'a BuildConfig, files: &'a FileHasher<S>) -> Self {
        Self {
            config,
            files,
            output_ids: HashMap::new(),
            debug: debug_hash_enabled(),
        }
    }

    /// Enables or disables the hash debug output, which defaults to
    /// [debug_hash_enabled].
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Registers the content ID of the package with the given import path.
    pub fn with_output_id(mut self, import_path: impl Into<String>, id: [u8; HASH_SIZE]) -> Self {
        self.output_ids.insert(import_path.into(), id);
        self
    }

    /// Returns the action ID of compiling the package of `action`.
    pub fn derive(&self, action: &Action) -> Result<ActionId, Error> {
        self.derive_memoized(action, &mut HashMap::new())
    }

    /// Derives the action ID, reusing IDs of dependencies already derived
    /// during this call. The memo is keyed by package identity, so distinct
    /// packages sharing an import path (like test variants) are derived
    /// separately.
    #[instrument(skip_all, fields(import_path = tracing::field::Empty), err)]
    fn derive_memoized(
        &self,
        action: &Action,
        memo: &mut HashMap<*const Package, ActionId>,
    ) -> Result<ActionId, Error> {
        let package = action.package.as_ref().ok_or(Error::MissingPackage)?;
        let p = package.as_ref();
        Span::current().record("import_path", p.import_path.as_str());

        if let Some(id) = memo.get(&Arc::as_ptr(package)) {
            return Ok(*id);
        }

        let mut h = Hash::new(self.config, &p.import_path, self.debug);
        self.write_package(&mut h, p)?;

        for dep in &action.deps {
            let Some(dp) = dep.package.as_deref() else {
                continue;
            };
            let content_id = match self.output_ids.get(&dp.import_path) {
                Some(id) => *id,
                None => self.derive_memoized(dep, memo)?.0,
            };
            writeln!(h, "import {} {}", dp.import_path, HEXLOWER.encode(&content_id));
        }

        let id = ActionId(h.sum());
        debug!(action_id = %id, "derived action ID");

        memo.insert(Arc::as_ptr(package), id);
        Ok(id)
    }

    /// Writes all records describing the package itself.
    fn write_package(&self, h: &mut Hash, p: &Package) -> Result<(), Error> {
        let config = self.config;

        writeln!(h, "compile");
        if let Some(module) = &p.module {
            writeln!(h, "module {}@{}", module.path, module.version);
            writeln!(h, "go {}", module.go_version);
        }
        writeln!(h, "goos {} goarch {}", config.goos, config.goarch);
        writeln!(h, "import {:?}", p.import_path);
        // local imports are not supported, so local and prefix are fixed.
        writeln!(
            h,
            "omitdebug {} standard {} local {} prefix {:?}",
            p.internal.omit_debug, p.standard, false, ""
        );
        // Paths are always trimmed, so the directory of the package does
        // not end up in the output.
        writeln!(h, "trimpath");

        if !p.cgo_files.is_empty() {
            return Err(Error::Unsupported("cgo"));
        }
        // Foreign sources are compiled by other toolchains, whose identity
        // and flags are not recorded.
        if !p.c_files.is_empty() {
            return Err(Error::Unsupported("C sources"));
        }
        if !p.cxx_files.is_empty() {
            return Err(Error::Unsupported("C++ sources"));
        }
        if !p.f_files.is_empty() {
            return Err(Error::Unsupported("Fortran sources"));
        }
        if !p.m_files.is_empty() {
            return Err(Error::Unsupported("Objective-C sources"));
        }
        if !p.swig_files.is_empty() || !p.swig_cxx_files.is_empty() {
            return Err(Error::Unsupported("swig"));
        }
        if p.internal.cover_mode.is_some() {
            return Err(Error::Unsupported("coverage"));
        }
        if p.internal.fuzz_instrument {
            return Err(Error::Unsupported("fuzz instrumentation"));
        }

        if let Some(build_info) = &p.internal.build_info {
            writeln!(h, "modinfo {:?}", build_info);
        }

        writeln!(
            h,
            "compile {} {:?} {:?}",
            config.tool_id("compile")?,
            config.forced_gcflags,
            p.internal.gcflags
        );
        if !p.s_files.is_empty() {
            return Err(Error::Unsupported("assembly"));
        }

        if let Some((name, value)) = config.arch_env() {
            writeln!(h, "{}={}", name, value);
        }
        if !config.clean_goexperiment.is_empty() {
            writeln!(h, "GOEXPERIMENT={}", config.clean_goexperiment);
        }

        for file in p.input_files() {
            let digest = self.files.hash_file(&p.dir.join(file))?;
            writeln!(h, "file {} {}", file, HEXLOWER.encode(&digest));
        }

        if let Some(profile) = &p.pgo_profile {
            let digest = self.files.hash_file(profile)?;
            writeln!(h, "pgofile {}", HEXLOWER.encode(&digest));
        }

        for dep in &p.deps {
            writeln!(h, "dep {}", dep);
        }

        Ok(())
    }
}

/// Returns the action ID of `action`, identifying dependencies by their
/// recursively derived action IDs.
pub fn derive_action_id<S: FileSource>(
    config: &BuildConfig,
    files: &FileHasher<S>,
    action: &Action,
) -> Result<ActionId, Error> {
    Deriver::new(config, files).derive(action)
}
