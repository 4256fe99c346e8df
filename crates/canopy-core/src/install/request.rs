//! The install request submitted to the Tooling API.

use std::fmt::Write as _;

use serde::Serialize;

use crate::client::types::InstallStatusRecord;

/// `PackageInstallRequest` sobject used to trigger a package version
/// install. Built once per attempt and submitted verbatim; never mutated
/// after submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageInstallRequest {
    pub subscriber_package_version_key: String,
    /// The installation key travels under the legacy `password` field
    /// name the server still expects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upgrade_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apex_compile_type: Option<String>,
    pub security_type: String,
    pub name_conflict_resolution: String,
    pub package_install_source: String,
    pub enable_rss: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_mappings: Option<ProfileMappings>,
}

impl PackageInstallRequest {
    pub fn new(apv_id: &str, installation_key: Option<&str>) -> Self {
        Self {
            subscriber_package_version_key: apv_id.to_string(),
            password: installation_key.map(str::to_string),
            name_conflict_resolution: "Block".to_string(),
            package_install_source: "U".to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileMappings {
    pub profile_mappings: Vec<ProfileMapping>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileMapping {
    /// Profile name shipped in the package.
    pub source: String,
    /// Matching profile id in the destination org.
    pub target: String,
}

/// Render a terminal ERROR record's server-reported messages as one
/// numbered, human-readable string.
pub fn read_install_errors(record: &InstallStatusRecord) -> String {
    let errors = record
        .errors
        .as_ref()
        .map(|wrapper| wrapper.errors.as_slice())
        .unwrap_or_default();
    if errors.is_empty() {
        return "<empty>".to_string();
    }
    let mut message = String::from("Installation errors: ");
    for (index, error) in errors.iter().enumerate() {
        let _ = write!(message, "\n{}) {}", index + 1, error.message);
    }
    message
}
