//! Thin client for the org platform's Metadata and Tooling APIs.
//!
//! [`PlatformApi`] is the seam between the command facades and the wire;
//! production code uses [`rest::RestClient`], tests substitute scripted
//! implementations.

pub mod rest;
pub mod soap;
pub mod types;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::error::Result;
use self::types::{CreateResult, DeployLaunch, DeployRequestOptions, DeployStatusRecord, QueryResult};

/// An error reported by the platform, decoded from an error response body.
#[derive(Debug, Clone, Default, Error, Deserialize)]
#[error("{error_code}: {message}")]
pub struct PlatformError {
    #[serde(rename = "errorCode", default)]
    pub error_code: String,
    #[serde(default)]
    pub message: String,
}

impl PlatformError {
    /// Malformed record id, e.g. a bogus `--job-id`.
    pub fn is_malformed_id(&self) -> bool {
        self.error_code == "MALFORMED_ID" || self.error_code == "sf:MALFORMED_ID"
    }

    /// API versions before 214 reject `InstallationKey` predicates on the
    /// `SubscriberPackageVersion` view with this restriction.
    pub fn is_spv_query_restriction(&self) -> bool {
        self.error_code == "MALFORMED_QUERY"
            && self
                .message
                .contains("Implementation restriction: SubscriberPackageVersion")
    }

    /// The package version has not replicated to the subscriber instance.
    pub fn is_package_unavailable(&self) -> bool {
        self.error_code == "PACKAGE_UNAVAILABLE" || self.error_code == "UNKNOWN_EXCEPTION"
    }
}

/// Remote operations the command facades depend on.
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Run a Tooling API query and return the raw rows.
    async fn tooling_query(&self, soql: &str) -> Result<QueryResult>;

    /// Fetch a single Tooling API record by id.
    async fn tooling_retrieve(&self, sobject: &str, id: &str) -> Result<Value>;

    /// Create a Tooling API record.
    async fn tooling_create(&self, sobject: &str, body: &Value) -> Result<CreateResult>;

    /// Submit a metadata archive over the REST deploy endpoint.
    async fn deploy_rest(
        &self,
        archive: Vec<u8>,
        options: &DeployRequestOptions,
    ) -> Result<DeployLaunch>;

    /// Submit a metadata archive over the SOAP deploy endpoint.
    async fn deploy_soap(
        &self,
        archive: Vec<u8>,
        options: &DeployRequestOptions,
    ) -> Result<DeployLaunch>;

    /// Deploy a previously validated request without re-running checks.
    async fn deploy_recent_validation(&self, validated_id: &str, rest: bool)
    -> Result<DeployLaunch>;

    /// Fetch the current status of a deploy request.
    async fn check_deploy_status(&self, id: &str) -> Result<DeployStatusRecord>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_id_matches_both_spellings() {
        let err = PlatformError {
            error_code: "sf:MALFORMED_ID".to_string(),
            message: String::new(),
        };
        assert!(err.is_malformed_id());
    }

    #[test]
    fn spv_restriction_requires_code_and_message() {
        let err = PlatformError {
            error_code: "MALFORMED_QUERY".to_string(),
            message: "Implementation restriction: SubscriberPackageVersion requires \
                      a filter by Id"
                .to_string(),
        };
        assert!(err.is_spv_query_restriction());

        let other = PlatformError {
            error_code: "MALFORMED_QUERY".to_string(),
            message: "unexpected token".to_string(),
        };
        assert!(!other.is_spv_query_restriction());
    }
}
