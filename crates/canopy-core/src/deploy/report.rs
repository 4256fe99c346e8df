//! Deploy status polling.

use crate::client::PlatformApi;
use crate::client::types::DeployStatusRecord;
use crate::error::Result;
use crate::poll::{DEFAULT_POLL_INTERVAL, RetryBudget, Sleeper};

/// Poll `job_id` until a terminal status or the wait budget runs out.
///
/// A wait of zero checks the status once. Exhausting the budget hands
/// back the last-seen record so callers can report where the deploy
/// stood; interpreting terminal failure is the caller's job.
pub async fn poll_deploy(
    client: &dyn PlatformApi,
    sleeper: &dyn Sleeper,
    job_id: &str,
    wait_minutes: i64,
) -> Result<DeployStatusRecord> {
    let mut budget = RetryBudget::from_wait_minutes(wait_minutes, DEFAULT_POLL_INTERVAL);
    loop {
        let record = client.check_deploy_status(job_id).await?;
        if record.status.is_terminal() {
            return Ok(record);
        }
        if !budget.try_consume() {
            return Ok(record);
        }
        tracing::info!(
            status = %record.status,
            "deployed {} of {} components",
            record.number_components_deployed,
            record.number_components_total
        );
        sleeper.sleep(DEFAULT_POLL_INTERVAL).await;
    }
}
