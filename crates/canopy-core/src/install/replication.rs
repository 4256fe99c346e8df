//! Pre-install replication wait.

use crate::client::PlatformApi;
use crate::client::types::SubscriberPackageVersionRecord;
use crate::error::{CanopyError, Result};
use crate::poll::{REPLICATION_POLL_INTERVAL, RetryBudget, Sleeper};

use super::spv_query;

pub const PACKAGE_UNAVAILABLE: &str = "PACKAGE_UNAVAILABLE";
pub const UNINSTALL_IN_PROGRESS: &str = "UNINSTALL_IN_PROGRESS";

const REPLICATION_FIELDS: &[&str] = &["Id", "SubscriberPackageId", "InstallValidationStatus"];

/// Wait until the package version has replicated to the target org.
///
/// Returns the record as soon as its `InstallValidationStatus` is neither
/// `PACKAGE_UNAVAILABLE` nor `UNINSTALL_IN_PROGRESS`; a missing record
/// counts as not yet replicated. Exhausting the budget raises
/// [`CanopyError::ReplicationTimeout`] — except when the last-seen status
/// was `UNINSTALL_IN_PROGRESS`, where the wait is abandoned (`None`) and
/// the install attempt surfaces its own conflict error.
pub async fn wait_for_replication(
    client: &dyn PlatformApi,
    sleeper: &dyn Sleeper,
    apv_id: &str,
    installation_key: Option<&str>,
    mut budget: RetryBudget,
) -> Result<Option<SubscriberPackageVersionRecord>> {
    loop {
        let row = spv_query(client, REPLICATION_FIELDS, apv_id, installation_key, true).await?;

        let mut status = None;
        if let Some(value) = row {
            let record: SubscriberPackageVersionRecord = serde_json::from_value(value)?;
            status = record.install_validation_status.clone();
            match status.as_deref() {
                Some(PACKAGE_UNAVAILABLE) | Some(UNINSTALL_IN_PROGRESS) => {}
                _ => return Ok(Some(record)),
            }
        }

        if !budget.try_consume() {
            if status.as_deref() == Some(UNINSTALL_IN_PROGRESS) {
                return Ok(None);
            }
            return Err(CanopyError::ReplicationTimeout);
        }

        tracing::info!("waiting for the package version to replicate to the target org");
        sleeper.sleep(REPLICATION_POLL_INTERVAL).await;
    }
}
