//! The description of compilation steps, as produced by package discovery.
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// A module: a versioned collection of packages.
///
/// Modules are shared between all their packages, see [Package::module].
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Module {
    /// module path
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    /// module version
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    /// go version used in module
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub go_version: String,
}

/// A single package found in a directory.
///
/// File names in the file lists are relative to [Package::dir]. The lists
/// are disjoint by role.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Package {
    /// directory containing package sources
    #[serde(default)]
    pub dir: PathBuf,
    /// import path of package in dir
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub import_path: String,
    /// info about package's module, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<Arc<Module>>,
    /// is this package found in the Go root?
    #[serde(default, skip_serializing_if = "is_false")]
    pub goroot: bool,
    /// is this package part of the standard Go library?
    #[serde(default, skip_serializing_if = "is_false")]
    pub standard: bool,

    /// .go source files (excluding cgo_files)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub go_files: Vec<String>,
    /// .go source files that import "C"
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cgo_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub c_files: Vec<String>,
    #[serde(rename = "CXXFiles", default, skip_serializing_if = "Vec::is_empty")]
    pub cxx_files: Vec<String>,
    /// Fortran source files
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub f_files: Vec<String>,
    /// Objective-C source files
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub m_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub h_files: Vec<String>,
    /// assembly source files
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub s_files: Vec<String>,
    /// system object files added to package
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub syso_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub swig_files: Vec<String>,
    #[serde(rename = "SwigCXXFiles", default, skip_serializing_if = "Vec::is_empty")]
    pub swig_cxx_files: Vec<String>,
    /// files matched by embed patterns
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embed_files: Vec<String>,

    /// path to the profile used for profile-guided optimization
    #[serde(rename = "PGOProfile", default, skip_serializing_if = "Option::is_none")]
    pub pgo_profile: Option<PathBuf>,

    /// all (recursively) imported dependencies
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deps: Vec<String>,

    #[serde(default)]
    pub internal: PackageInternal,
}

/// Per-build settings of a [Package], not derived from its sources.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PackageInternal {
    /// module version info stamped into binaries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_info: Option<String>,
    /// omit debug information
    #[serde(default, skip_serializing_if = "is_false")]
    pub omit_debug: bool,
    /// compiler flags specific to this package
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gcflags: Vec<String>,
    /// coverage mode, if the package is built with coverage instrumentation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_mode: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub fuzz_instrument: bool,
}

fn is_false(b: &bool) -> bool {
    !b
}

impl Package {
    /// Returns all input files, in the order they are hashed.
    pub fn input_files(&self) -> impl Iterator<Item = &str> {
        [
            &self.go_files,
            &self.cgo_files,
            &self.c_files,
            &self.cxx_files,
            &self.f_files,
            &self.m_files,
            &self.h_files,
            &self.s_files,
            &self.syso_files,
            &self.swig_files,
            &self.swig_cxx_files,
            &self.embed_files,
        ]
        .into_iter()
        .flatten()
        .map(String::as_str)
    }
}

/// A node in the build graph: one package to compile, and the actions
/// building its direct dependencies.
///
/// Dependencies are shared, immutable nodes, so the graph can't contain
/// cycles.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Action {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<Arc<Package>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deps: Vec<Arc<Action>>,
}

impl Action {
    pub fn new(package: Arc<Package>, deps: Vec<Arc<Action>>) -> Self {
        Action {
            package: Some(package),
            deps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn input_files_in_role_order() {
        let p = Package {
            embed_files: vec!["static/index.html".to_string()],
            h_files: vec!["defs.h".to_string()],
            go_files: vec!["b.go".to_string(), "a.go".to_string()],
            syso_files: vec!["rsrc.syso".to_string()],
            ..Default::default()
        };

        assert_eq!(
            vec!["b.go", "a.go", "defs.h", "rsrc.syso", "static/index.html"],
            p.input_files().collect::<Vec<_>>()
        );
    }

    #[test]
    fn deserialize_package() {
        let p: Package = serde_json::from_str(
            r#"{
                "Dir": "go/src/internal/goarch",
                "ImportPath": "internal/goarch",
                "Standard": true,
                "GoFiles": ["goarch.go", "goarch_arm64.go", "zgoarch_arm64.go"],
                "SwigCXXFiles": ["x.swigcxx"],
                "PGOProfile": "default.pgo",
                "Module": {"Path": "std", "GoVersion": "1.21"},
                "Internal": {"BuildInfo": "path\tstd", "Gcflags": ["-N"]}
            }"#,
        )
        .expect("must parse");

        assert_eq!("internal/goarch", p.import_path);
        assert!(p.standard);
        assert!(!p.goroot);
        assert_eq!(3, p.go_files.len());
        assert_eq!(vec!["x.swigcxx".to_string()], p.swig_cxx_files);
        assert_eq!(Some(PathBuf::from("default.pgo")), p.pgo_profile);
        assert_eq!(
            Some(Arc::new(Module {
                path: "std".to_string(),
                version: "".to_string(),
                go_version: "1.21".to_string(),
            })),
            p.module
        );
        assert_eq!(Some("path\tstd".to_string()), p.internal.build_info);
        assert_eq!(vec!["-N".to_string()], p.internal.gcflags);
    }

    #[test]
    fn serialize_omits_empty_fields() {
        let p = Package {
            import_path: "fmt".to_string(),
            go_files: vec!["print.go".to_string()],
            ..Default::default()
        };

        assert_eq!(
            r#"{"Dir":"","ImportPath":"fmt","GoFiles":["print.go"],"Internal":{}}"#,
            serde_json::to_string(&p).expect("must serialize")
        );
    }

    #[test]
    fn deserialize_action_graph() {
        let a: Action = serde_json::from_str(
            r#"{
                "Package": {"ImportPath": "main", "Deps": ["fmt"]},
                "Deps": [{"Package": {"ImportPath": "fmt"}}]
            }"#,
        )
        .expect("must parse");

        assert_eq!(
            "main",
            a.package.as_ref().expect("package must be set").import_path
        );
        assert_eq!(1, a.deps.len());
        assert_eq!(
            "fmt",
            a.deps[0].package.as_ref().expect("package must be set").import_path
        );
    }
}
