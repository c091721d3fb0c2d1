//! Module open requests
//!
//! A request asks the runtime to open one or more packages of a module to
//! another module, the equivalent of `--add-opens` on the command line.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::utils::{ensure_identifier, ensure_not_empty};

/// Sentinel opening-module name: the unnamed module of the loader that
/// performs the opening
///
/// Resolved per loader, never to a single global unnamed module.
pub const ALL_UNNAMED: &str = "ALL-UNNAMED";

/// Request construction errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl RequestError {
    fn invalid(message: String) -> Self {
        RequestError::InvalidArgument(message)
    }
}

/// Open `packages` of `opened_module` to `opening_module`
///
/// Immutable once built; construction rejects empty package sets and blank
/// names so nothing invalid ever reaches a reconfigurer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawModuleOpenRequest")]
pub struct ModuleOpenRequest {
    opened_module: String,
    opening_module: String,
    packages: BTreeSet<String>,
}

#[derive(Deserialize)]
struct RawModuleOpenRequest {
    opened_module: String,
    #[serde(default = "default_opening_module")]
    opening_module: String,
    packages: Vec<String>,
}

fn default_opening_module() -> String {
    ALL_UNNAMED.to_string()
}

impl TryFrom<RawModuleOpenRequest> for ModuleOpenRequest {
    type Error = RequestError;

    fn try_from(raw: RawModuleOpenRequest) -> Result<Self, Self::Error> {
        ModuleOpenRequest::new(raw.opened_module, raw.opening_module, raw.packages)
    }
}

impl ModuleOpenRequest {
    /// Create a request opening `packages` of `opened_module` to `opening_module`
    pub fn new<I, S>(
        opened_module: impl Into<String>,
        opening_module: impl Into<String>,
        packages: I,
    ) -> Result<Self, RequestError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let opened_module = opened_module.into();
        let opening_module = opening_module.into();
        let packages: Vec<String> = packages.into_iter().map(Into::into).collect();

        ensure_identifier(&opened_module, "opened module name").map_err(RequestError::invalid)?;
        ensure_identifier(&opening_module, "opening module name").map_err(RequestError::invalid)?;
        ensure_not_empty(&packages, "package names").map_err(RequestError::invalid)?;
        for package in &packages {
            ensure_identifier(package, "package name").map_err(RequestError::invalid)?;
        }

        Ok(Self {
            opened_module,
            opening_module,
            packages: packages.into_iter().collect(),
        })
    }

    /// Create a request opening `packages` to the loader's unnamed module
    pub fn to_all_unnamed<I, S>(
        opened_module: impl Into<String>,
        packages: I,
    ) -> Result<Self, RequestError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(opened_module, ALL_UNNAMED, packages)
    }

    pub fn opened_module(&self) -> &str {
        &self.opened_module
    }

    pub fn opening_module(&self) -> &str {
        &self.opening_module
    }

    /// Package names, sorted and deduplicated
    pub fn packages(&self) -> &BTreeSet<String> {
        &self.packages
    }

    /// Whether the opening module is the per-loader unnamed module
    pub fn opens_to_unnamed(&self) -> bool {
        self.opening_module == ALL_UNNAMED
    }

    /// `module/package` entries in manifest syntax, sorted
    pub fn manifest_entries(&self) -> impl Iterator<Item = String> + '_ {
        self.packages
            .iter()
            .map(move |package| format!("{}/{}", self.opened_module, package))
    }
}

impl fmt::Display for ModuleOpenRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{{", self.opened_module)?;
        for (i, package) in self.packages.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            f.write_str(package)?;
        }
        write!(f, "}} -> {}", self.opening_module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_request() {
        let request =
            ModuleOpenRequest::new("java.base", "other.module", ["java.util", "java.lang"])
                .unwrap();
        assert_eq!(request.opened_module(), "java.base");
        assert_eq!(request.opening_module(), "other.module");
        assert_eq!(
            request.packages().iter().collect::<Vec<_>>(),
            vec!["java.lang", "java.util"]
        );
        assert!(!request.opens_to_unnamed());
    }

    #[test]
    fn test_empty_packages_rejected() {
        let err = ModuleOpenRequest::to_all_unnamed("java.base", Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, RequestError::InvalidArgument(msg) if msg.contains("package names")));
    }

    #[test]
    fn test_blank_names_rejected() {
        assert!(ModuleOpenRequest::new("", ALL_UNNAMED, ["java.lang"]).is_err());
        assert!(ModuleOpenRequest::new("java.base", "", ["java.lang"]).is_err());
        assert!(ModuleOpenRequest::new("java.base", ALL_UNNAMED, ["java lang"]).is_err());
    }

    #[test]
    fn test_duplicate_packages_collapse() {
        let request =
            ModuleOpenRequest::to_all_unnamed("java.base", ["java.lang", "java.lang"]).unwrap();
        assert_eq!(request.packages().len(), 1);
    }

    #[test]
    fn test_display_is_stable() {
        let request =
            ModuleOpenRequest::to_all_unnamed("java.base", ["java.util", "java.lang"]).unwrap();
        assert_eq!(request.to_string(), "java.base/{java.lang,java.util} -> ALL-UNNAMED");
    }

    #[test]
    fn test_manifest_entries() {
        let request =
            ModuleOpenRequest::to_all_unnamed("java.base", ["java.util", "java.lang"]).unwrap();
        let entries: Vec<_> = request.manifest_entries().collect();
        assert_eq!(entries, vec!["java.base/java.lang", "java.base/java.util"]);
    }

    #[test]
    fn test_deserialize_validates() {
        let request: ModuleOpenRequest =
            serde_json::from_str(r#"{"opened_module":"java.base","packages":["java.lang"]}"#)
                .unwrap();
        assert!(request.opens_to_unnamed());

        let err = serde_json::from_str::<ModuleOpenRequest>(
            r#"{"opened_module":"java.base","packages":[]}"#,
        );
        assert!(err.is_err());
    }
}
