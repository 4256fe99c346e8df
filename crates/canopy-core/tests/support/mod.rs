//! Scripted platform client, clock, and prompt for command tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use canopy_core::client::types::{
    CreateResult, DeployLaunch, DeployRequestOptions, DeployStatusRecord, QueryResult,
};
use canopy_core::client::{PlatformApi, PlatformError};
use canopy_core::config::CanopyConfig;
use canopy_core::context::AppContext;
use canopy_core::error::{CanopyError, Result};
use canopy_core::install::ConsentPrompt;
use canopy_core::org::Org;
use canopy_core::poll::Sleeper;

pub fn test_org() -> Org {
    Org {
        username: "admin@example.org".to_string(),
        instance_url: "https://example.my.platform.com".parse().unwrap(),
        access_token: "00Dxx!token".to_string(),
        api_version: "62.0".to_string(),
    }
}

pub fn test_context(state_dir: &Path) -> AppContext {
    test_context_with(state_dir, CanopyConfig::default(), test_org())
}

pub fn test_context_with(state_dir: &Path, config: CanopyConfig, org: Org) -> AppContext {
    AppContext::new(config, state_dir.to_path_buf(), org)
}

/// Platform client that replays scripted responses and records every
/// call it sees.
#[derive(Default)]
pub struct MockClient {
    pub query_responses: Mutex<VecDeque<Result<QueryResult>>>,
    pub retrieve_responses: Mutex<VecDeque<Result<Value>>>,
    pub create_responses: Mutex<VecDeque<Result<CreateResult>>>,
    pub deploy_responses: Mutex<VecDeque<Result<DeployLaunch>>>,
    pub recent_validation_responses: Mutex<VecDeque<Result<DeployLaunch>>>,
    pub status_responses: Mutex<VecDeque<Result<DeployStatusRecord>>>,

    pub queries: Mutex<Vec<String>>,
    pub retrieves: Mutex<Vec<(String, String)>>,
    pub creates: Mutex<Vec<(String, Value)>>,
    pub deploys: Mutex<Vec<(&'static str, DeployRequestOptions)>>,
    pub recent_validations: Mutex<Vec<(String, bool)>>,
    pub status_checks: Mutex<Vec<String>>,
}

impl MockClient {
    pub fn push_query_rows(&self, rows: Vec<Value>) {
        self.query_responses
            .lock()
            .unwrap()
            .push_back(Ok(QueryResult {
                total_size: rows.len() as u64,
                done: true,
                records: rows,
            }));
    }

    pub fn push_query_error(&self, error_code: &str, message: &str) {
        self.query_responses
            .lock()
            .unwrap()
            .push_back(Err(platform_error(error_code, message)));
    }

    pub fn push_retrieve(&self, value: Value) {
        self.retrieve_responses.lock().unwrap().push_back(Ok(value));
    }

    pub fn push_create_id(&self, id: Option<&str>) {
        self.create_responses
            .lock()
            .unwrap()
            .push_back(Ok(CreateResult {
                id: id.map(str::to_string),
                success: id.is_some(),
            }));
    }

    pub fn push_deploy_launch(&self, id: &str) {
        self.deploy_responses
            .lock()
            .unwrap()
            .push_back(Ok(DeployLaunch {
                id: id.to_string(),
                state: Default::default(),
            }));
    }

    pub fn push_recent_validation_launch(&self, id: &str) {
        self.recent_validation_responses
            .lock()
            .unwrap()
            .push_back(Ok(DeployLaunch {
                id: id.to_string(),
                state: Default::default(),
            }));
    }

    pub fn push_status(&self, record: DeployStatusRecord) {
        self.status_responses.lock().unwrap().push_back(Ok(record));
    }

    pub fn push_status_error(&self, error_code: &str, message: &str) {
        self.status_responses
            .lock()
            .unwrap()
            .push_back(Err(platform_error(error_code, message)));
    }

    fn pop<T>(queue: &Mutex<VecDeque<Result<T>>>, what: &str) -> Result<T> {
        queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected {what} call"))
    }
}

pub fn platform_error(error_code: &str, message: &str) -> CanopyError {
    CanopyError::Platform(PlatformError {
        error_code: error_code.to_string(),
        message: message.to_string(),
    })
}

#[async_trait]
impl PlatformApi for MockClient {
    async fn tooling_query(&self, soql: &str) -> Result<QueryResult> {
        self.queries.lock().unwrap().push(soql.to_string());
        Self::pop(&self.query_responses, "tooling_query")
    }

    async fn tooling_retrieve(&self, sobject: &str, id: &str) -> Result<Value> {
        self.retrieves
            .lock()
            .unwrap()
            .push((sobject.to_string(), id.to_string()));
        Self::pop(&self.retrieve_responses, "tooling_retrieve")
    }

    async fn tooling_create(&self, sobject: &str, body: &Value) -> Result<CreateResult> {
        self.creates
            .lock()
            .unwrap()
            .push((sobject.to_string(), body.clone()));
        Self::pop(&self.create_responses, "tooling_create")
    }

    async fn deploy_rest(
        &self,
        _archive: Vec<u8>,
        options: &DeployRequestOptions,
    ) -> Result<DeployLaunch> {
        self.deploys.lock().unwrap().push(("rest", options.clone()));
        Self::pop(&self.deploy_responses, "deploy_rest")
    }

    async fn deploy_soap(
        &self,
        _archive: Vec<u8>,
        options: &DeployRequestOptions,
    ) -> Result<DeployLaunch> {
        self.deploys.lock().unwrap().push(("soap", options.clone()));
        Self::pop(&self.deploy_responses, "deploy_soap")
    }

    async fn deploy_recent_validation(
        &self,
        validated_id: &str,
        rest: bool,
    ) -> Result<DeployLaunch> {
        self.recent_validations
            .lock()
            .unwrap()
            .push((validated_id.to_string(), rest));
        Self::pop(&self.recent_validation_responses, "deploy_recent_validation")
    }

    async fn check_deploy_status(&self, id: &str) -> Result<DeployStatusRecord> {
        self.status_checks.lock().unwrap().push(id.to_string());
        Self::pop(&self.status_responses, "check_deploy_status")
    }
}

/// Clock that records requested delays without waiting.
#[derive(Default)]
pub struct RecordingSleeper {
    pub sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn count(&self) -> usize {
        self.sleeps.lock().unwrap().len()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

/// Prompt that replays scripted answers and records the messages shown.
#[derive(Default)]
pub struct ScriptedPrompt {
    pub answers: Mutex<VecDeque<bool>>,
    pub messages: Mutex<Vec<String>>,
}

impl ScriptedPrompt {
    pub fn answering(answers: &[bool]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().copied().collect()),
            messages: Mutex::new(Vec::new()),
        }
    }

    pub fn message_count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }
}

impl ConsentPrompt for ScriptedPrompt {
    fn confirm(&self, message: &str) -> anyhow::Result<bool> {
        self.messages.lock().unwrap().push(message.to_string());
        Ok(self
            .answers
            .lock()
            .unwrap()
            .pop_front()
            .expect("unexpected prompt"))
    }
}
