//! Wire types for the platform's Metadata and Tooling APIs.
//!
//! Query rows stay as raw JSON values; call sites deserialize the views
//! they asked for. Status records are externally defined — only the
//! fields the facades inspect are modeled, everything else is ignored.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One page of Tooling API query results.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryResult {
    #[serde(rename = "totalSize", default)]
    pub total_size: u64,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub records: Vec<Value>,
}

/// Response to a Tooling API sobject create.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateResult {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub success: bool,
}

/// Identifier handed back when a deploy is accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployLaunch {
    pub id: String,
    pub state: DeployState,
}

/// Externally defined deploy status enumeration.
///
/// Anything this code does not recognize decodes to [`DeployState::Queued`]
/// and is treated as still-in-progress pass-through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeployState {
    Pending,
    InProgress,
    Succeeded,
    SucceededPartial,
    Failed,
    Canceling,
    Canceled,
    #[default]
    #[serde(other)]
    Queued,
}

impl DeployState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::SucceededPartial | Self::Failed | Self::Canceled
        )
    }
}

impl fmt::Display for DeployState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "Pending",
            Self::InProgress => "InProgress",
            Self::Succeeded => "Succeeded",
            Self::SucceededPartial => "SucceededPartial",
            Self::Failed => "Failed",
            Self::Canceling => "Canceling",
            Self::Canceled => "Canceled",
            Self::Queued => "Queued",
        };
        f.write_str(name)
    }
}

/// Deploy status as reported by `deployRequest/{id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployStatusRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: DeployState,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub number_components_deployed: u32,
    #[serde(default)]
    pub number_components_total: u32,
    #[serde(default)]
    pub number_component_errors: u32,
    #[serde(default)]
    pub number_tests_completed: u32,
    #[serde(default)]
    pub number_tests_total: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<DeployDetails>,
}

impl DeployStatusRecord {
    /// Whether the attached test-run results report any failures.
    pub fn has_test_failures(&self) -> bool {
        self.details
            .as_ref()
            .and_then(|details| details.run_test_result.as_ref())
            .is_some_and(|run| run.num_failures != "0")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_test_result: Option<RunTestResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub component_failures: Vec<Value>,
}

fn zero() -> String {
    "0".to_string()
}

/// Test counts come back as strings on the wire; they are compared, never
/// computed with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTestResult {
    #[serde(default = "zero")]
    pub num_failures: String,
    #[serde(default = "zero")]
    pub num_tests_run: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<Value>,
}

/// Options forwarded verbatim with a deploy submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployRequestOptions {
    pub rollback_on_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_level: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub run_tests: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub auto_update_package: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub ignore_warnings: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub check_only: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub single_package: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub purge_on_delete: bool,
}

/// `PackageInstallRequest` status enumeration. Only SUCCESS and ERROR are
/// terminal; everything else is in-progress pass-through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstallState {
    Success,
    Error,
    #[default]
    InProgress,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "SUCCESS",
            Self::Error => "ERROR",
            Self::InProgress => "IN_PROGRESS",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// A retrieved `PackageInstallRequest` row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstallStatusRecord {
    #[serde(rename = "Id", default)]
    pub id: String,
    #[serde(rename = "Status", default)]
    pub status: InstallState,
    #[serde(rename = "SubscriberPackageVersionKey", default)]
    pub subscriber_package_version_key: Option<String>,
    #[serde(rename = "Errors", default)]
    pub errors: Option<InstallErrors>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstallErrors {
    #[serde(default)]
    pub errors: Vec<InstallErrorDetail>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstallErrorDetail {
    #[serde(default)]
    pub message: String,
}

/// `SubscriberPackageVersion` row, shaped for the three queries the
/// install facade issues against that view.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriberPackageVersionRecord {
    #[serde(rename = "Id", default)]
    pub id: String,
    #[serde(rename = "SubscriberPackageId", default)]
    pub subscriber_package_id: Option<String>,
    #[serde(rename = "InstallValidationStatus", default)]
    pub install_validation_status: Option<String>,
    #[serde(rename = "Package2ContainerOptions", default)]
    pub container_options: Option<String>,
    #[serde(rename = "RemoteSiteSettings", default)]
    pub remote_site_settings: Option<RemoteSiteSettings>,
    #[serde(rename = "CspTrustedSites", default)]
    pub csp_trusted_sites: Option<CspTrustedSites>,
    #[serde(rename = "Profiles", default)]
    pub profiles: Option<ProfileBag>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteSiteSettings {
    #[serde(default)]
    pub settings: Vec<RemoteSiteSetting>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteSiteSetting {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CspTrustedSites {
    #[serde(default)]
    pub settings: Vec<CspTrustedSite>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CspTrustedSite {
    #[serde(rename = "endpointUrl", default)]
    pub endpoint_url: String,
}

/// Package/org profile inventory used for profile-mapping reconciliation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileBag {
    #[serde(rename = "sourceProfiles", default)]
    pub source_profiles: Vec<SourceProfile>,
    #[serde(rename = "destinationProfiles", default)]
    pub destination_profiles: Vec<DestinationProfile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceProfile {
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DestinationProfile {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "profileId", default)]
    pub profile_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_deploy_state_decodes_as_queued() {
        let state: DeployState = serde_json::from_str("\"HoldingPattern\"").unwrap();
        assert_eq!(state, DeployState::Queued);
        assert!(!state.is_terminal());
    }

    #[test]
    fn terminal_deploy_states() {
        assert!(DeployState::Succeeded.is_terminal());
        assert!(DeployState::Failed.is_terminal());
        assert!(DeployState::Canceled.is_terminal());
        assert!(!DeployState::InProgress.is_terminal());
        assert!(!DeployState::Canceling.is_terminal());
    }

    #[test]
    fn test_failures_require_nonzero_count() {
        let record: DeployStatusRecord = serde_json::from_value(serde_json::json!({
            "id": "0Af000000000001",
            "status": "Failed",
            "details": { "runTestResult": { "numFailures": "2" } }
        }))
        .unwrap();
        assert!(record.has_test_failures());

        let clean: DeployStatusRecord = serde_json::from_value(serde_json::json!({
            "id": "0Af000000000002",
            "status": "Failed",
            "details": { "runTestResult": { "numFailures": "0" } }
        }))
        .unwrap();
        assert!(!clean.has_test_failures());

        let no_tests = DeployStatusRecord::default();
        assert!(!no_tests.has_test_failures());
    }

    #[test]
    fn deploy_request_options_omit_unset_flags() {
        let options = DeployRequestOptions {
            rollback_on_error: true,
            ..Default::default()
        };
        let json = serde_json::to_value(&options).unwrap();
        assert_eq!(json, serde_json::json!({ "rollbackOnError": true }));
    }

    #[test]
    fn install_state_decodes_wire_names() {
        let state: InstallState = serde_json::from_str("\"IN_PROGRESS\"").unwrap();
        assert_eq!(state, InstallState::InProgress);
        let state: InstallState = serde_json::from_str("\"SOMETHING_NEW\"").unwrap();
        assert_eq!(state, InstallState::Unknown);
    }
}
