use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::Error;

/// The version string used when [BuildConfig::runtime_version] is unset.
pub const SELF_VERSION: &str = concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"));

/// Describes the target platform and toolchain of one build session.
///
/// A [BuildConfig] is constructed once and only queried afterwards. It
/// provides the salt of every [crate::hash::Hash], as well as the
/// platform-specific records written during action ID derivation.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(rename = "GOOS")]
    pub goos: String,

    #[serde(rename = "GOARCH")]
    pub goarch: String,

    #[serde(rename = "CleanGOEXPERIMENT", default, skip_serializing_if = "String::is_empty")]
    pub clean_goexperiment: String,

    /// Toolchain version, e.g. `go1.21.0` or `devel go1.22-abcdef X:fieldtrack`.
    #[serde(rename = "RuntimeVersion", default, skip_serializing_if = "Option::is_none")]
    pub runtime_version: Option<String>,

    /// Identity strings of toolchain components, by tool name.
    #[serde(rename = "ToolID", default)]
    pub tool_ids: BTreeMap<String, String>,

    /// Compiler flags forced by the platform, e.g. `-shared`.
    #[serde(rename = "ForcedGCFlags", default)]
    pub forced_gcflags: Vec<String>,

    /// Overrides the pinned value of the architecture sub-variant, like
    /// `GOAMD64=v3` instead of `v1`.
    #[serde(rename = "ArchVariant", default, skip_serializing_if = "Option::is_none")]
    pub arch_variant: Option<String>,
}

impl BuildConfig {
    /// Returns a config describing the platform this process runs on,
    /// without any tool IDs.
    pub fn host() -> Self {
        BuildConfig {
            goos: goos_from_rust(std::env::consts::OS).to_string(),
            goarch: goarch_from_rust(std::env::consts::ARCH).to_string(),
            ..Default::default()
        }
    }

    /// Returns the environment variable selecting the architecture
    /// sub-variant and its value, or None for architectures without one.
    pub fn arch_env(&self) -> Option<(&'static str, String)> {
        let (name, pinned) = match self.goarch.as_str() {
            "arm" => ("GOARM", "7"),
            "amd64" => ("GOAMD64", "v1"),
            "386" => ("GO386", "sse2"),
            "mips" | "mipsle" => ("GOMIPS", "hardfloat"),
            "mips64" | "mips64le" => ("GOMIPS64", "hardfloat"),
            "ppc64" | "ppc64le" => ("GOPPC64", "power8"),
            _ => return None,
        };

        let value = match &self.arch_variant {
            Some(variant) if !variant.is_empty() => variant.clone(),
            _ => pinned.to_string(),
        };

        Some((name, value))
    }

    /// Returns the configured toolchain version, falling back to the
    /// version of this library.
    pub fn effective_runtime_version(&self) -> &str {
        match &self.runtime_version {
            Some(v) if !v.is_empty() => v.as_str(),
            _ => SELF_VERSION,
        }
    }

    /// Returns the salt written at the start of every salted hash.
    ///
    /// Experiments the toolchain was built with are stripped, so toolchains
    /// only differing in those share cache entries.
    pub fn hash_salt(&self) -> &[u8] {
        strip_experiment(self.effective_runtime_version()).as_bytes()
    }

    /// Looks up the identity string of the named toolchain component.
    pub fn tool_id(&self, name: &str) -> Result<&str, Error> {
        self.tool_ids
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| Error::MissingToolId(name.to_string()))
    }
}

/// Strips any GOEXPERIMENT configuration (a `" X:..."` suffix) from a
/// toolchain version string.
pub fn strip_experiment(version: &str) -> &str {
    match version.find(" X:") {
        Some(i) => &version[..i],
        None => version,
    }
}

fn goos_from_rust(os: &str) -> &str {
    match os {
        "macos" => "darwin",
        other => other,
    }
}

fn goarch_from_rust(arch: &str) -> &str {
    match arch {
        "x86_64" => "amd64",
        "x86" => "386",
        "aarch64" => "arm64",
        "powerpc64" => "ppc64",
        "loongarch64" => "loong64",
        other => other,
    }
}
