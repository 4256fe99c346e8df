//! reqwest-backed [`PlatformApi`] implementation.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::multipart;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::soap;
use super::types::{
    CreateResult, DeployLaunch, DeployRequestOptions, DeployState, DeployStatusRecord, QueryResult,
};
use super::{PlatformApi, PlatformError};
use crate::error::{CanopyError, Result};
use crate::org::Org;

pub struct RestClient {
    http: reqwest::Client,
    org: Org,
}

impl RestClient {
    pub fn new(org: Org) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("canopy/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, org })
    }

    fn data_url(&self, path: &str) -> String {
        format!(
            "{}/services/data/v{}/{}",
            self.org.base_url(),
            self.org.api_version,
            path
        )
    }

    fn soap_url(&self) -> String {
        format!(
            "{}/services/Soap/m/{}",
            self.org.base_url(),
            self.org.api_version
        )
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.org.access_token)
    }

    async fn decode<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;
        if status.is_success() {
            Ok(serde_json::from_str(&body)?)
        } else {
            Err(decode_error(status, &body))
        }
    }

    async fn soap_call(&self, action: &str, envelope: String) -> Result<String> {
        let response = self
            .http
            .post(self.soap_url())
            .header(CONTENT_TYPE, "text/xml; charset=UTF-8")
            .header("SOAPAction", format!("\"{action}\""))
            .body(envelope)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if status.is_success() {
            Ok(body)
        } else {
            // Faults surface their platform error code in <faultcode>.
            let message = soap::extract_tag(&body, "faultstring")
                .unwrap_or(&body)
                .to_string();
            let error_code = soap::extract_tag(&body, "faultcode")
                .unwrap_or("SOAP_FAULT")
                .to_string();
            Err(CanopyError::Platform(PlatformError {
                error_code,
                message,
            }))
        }
    }
}

/// Error bodies are `[{errorCode, message}]`; anything else is carried
/// verbatim under a synthetic HTTP code.
fn decode_error(status: reqwest::StatusCode, body: &str) -> CanopyError {
    let errors: Vec<PlatformError> = serde_json::from_str(body).unwrap_or_default();
    let error = errors.into_iter().next().unwrap_or_else(|| PlatformError {
        error_code: format!("HTTP_{}", status.as_u16()),
        message: body.trim().to_string(),
    });
    CanopyError::Platform(error)
}

/// Response to a deploy submission or quick-deploy request.
#[derive(Debug, Default, Deserialize)]
struct DeployAccepted {
    #[serde(default)]
    id: String,
    #[serde(rename = "deployResult", default)]
    deploy_result: Option<DeployStatusRecord>,
}

impl DeployAccepted {
    fn into_launch(self) -> DeployLaunch {
        let state = self
            .deploy_result
            .map(|result| result.status)
            .unwrap_or_default();
        DeployLaunch { id: self.id, state }
    }
}

#[derive(Debug, Default, Deserialize)]
struct DeployStatusWrapper {
    #[serde(default)]
    id: String,
    #[serde(rename = "deployResult", default)]
    deploy_result: DeployStatusRecord,
}

#[async_trait]
impl PlatformApi for RestClient {
    async fn tooling_query(&self, soql: &str) -> Result<QueryResult> {
        let response = self
            .http
            .get(self.data_url("tooling/query"))
            .query(&[("q", soql)])
            .header(AUTHORIZATION, self.bearer())
            .send()
            .await?;
        self.decode(response).await
    }

    async fn tooling_retrieve(&self, sobject: &str, id: &str) -> Result<Value> {
        let response = self
            .http
            .get(self.data_url(&format!("tooling/sobjects/{sobject}/{id}")))
            .header(AUTHORIZATION, self.bearer())
            .send()
            .await?;
        self.decode(response).await
    }

    async fn tooling_create(&self, sobject: &str, body: &Value) -> Result<CreateResult> {
        let response = self
            .http
            .post(self.data_url(&format!("tooling/sobjects/{sobject}")))
            .header(AUTHORIZATION, self.bearer())
            .json(body)
            .send()
            .await?;
        self.decode(response).await
    }

    async fn deploy_rest(
        &self,
        archive: Vec<u8>,
        options: &DeployRequestOptions,
    ) -> Result<DeployLaunch> {
        let entity = json!({ "deployOptions": options });
        let form = multipart::Form::new()
            .part(
                "json",
                multipart::Part::text(entity.to_string()).mime_str("application/json")?,
            )
            .part(
                "file",
                multipart::Part::bytes(archive)
                    .file_name("deploy.zip")
                    .mime_str("application/zip")?,
            );
        let response = self
            .http
            .post(self.data_url("metadata/deployRequest"))
            .header(AUTHORIZATION, self.bearer())
            .multipart(form)
            .send()
            .await?;
        let accepted: DeployAccepted = self.decode(response).await?;
        Ok(accepted.into_launch())
    }

    async fn deploy_soap(
        &self,
        archive: Vec<u8>,
        options: &DeployRequestOptions,
    ) -> Result<DeployLaunch> {
        let encoded = BASE64.encode(&archive);
        let envelope = soap::deploy_envelope(&self.org.access_token, &encoded, options);
        let body = self.soap_call("deploy", envelope).await?;
        let id = soap::extract_tag(&body, "id")
            .ok_or_else(|| {
                CanopyError::Platform(PlatformError {
                    error_code: "MALFORMED_RESPONSE".to_string(),
                    message: "deploy response did not carry a request id".to_string(),
                })
            })?
            .to_string();
        Ok(DeployLaunch {
            id,
            state: DeployState::Queued,
        })
    }

    async fn deploy_recent_validation(
        &self,
        validated_id: &str,
        rest: bool,
    ) -> Result<DeployLaunch> {
        if rest {
            let body = json!({ "validatedDeployRequestId": validated_id });
            let response = self
                .http
                .post(self.data_url("metadata/deployRequest"))
                .header(AUTHORIZATION, self.bearer())
                .json(&body)
                .send()
                .await?;
            let accepted: DeployAccepted = self.decode(response).await?;
            // The quick-deploy response carries only the new request id.
            Ok(DeployLaunch {
                id: accepted.id,
                state: DeployState::Queued,
            })
        } else {
            let envelope =
                soap::deploy_recent_validation_envelope(&self.org.access_token, validated_id);
            let body = self.soap_call("deployRecentValidation", envelope).await?;
            let id = soap::extract_tag(&body, "result")
                .ok_or_else(|| {
                    CanopyError::Platform(PlatformError {
                        error_code: "MALFORMED_RESPONSE".to_string(),
                        message: "deployRecentValidation response did not carry a request id"
                            .to_string(),
                    })
                })?
                .to_string();
            Ok(DeployLaunch {
                id,
                state: DeployState::Queued,
            })
        }
    }

    async fn check_deploy_status(&self, id: &str) -> Result<DeployStatusRecord> {
        let response = self
            .http
            .get(self.data_url(&format!("metadata/deployRequest/{id}?includeDetails=true")))
            .header(AUTHORIZATION, self.bearer())
            .send()
            .await?;
        let wrapper: DeployStatusWrapper = self.decode(response).await?;
        let mut record = wrapper.deploy_result;
        if record.id.is_empty() {
            record.id = wrapper.id;
        }
        Ok(record)
    }
}
