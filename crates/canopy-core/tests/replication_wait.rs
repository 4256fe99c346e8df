//! Replication-wait behavior, including the installation-key query
//! fallback for older platform versions.

mod support;

use std::time::Duration;

use serde_json::json;

use canopy_core::error::CanopyError;
use canopy_core::install::replication::wait_for_replication;
use canopy_core::poll::RetryBudget;

use support::{MockClient, RecordingSleeper};

const APV_ID: &str = "04t000000000001AAA";

fn row(status: &str) -> serde_json::Value {
    json!({
        "Id": APV_ID,
        "SubscriberPackageId": "033000000000001AAA",
        "InstallValidationStatus": status
    })
}

#[tokio::test]
async fn returns_as_soon_as_the_status_is_not_pending() {
    let client = MockClient::default();
    let sleeper = RecordingSleeper::default();
    client.push_query_rows(vec![row("NO_ERRORS_DETECTED")]);

    let record = wait_for_replication(&client, &sleeper, APV_ID, None, RetryBudget::new(5))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        record.install_validation_status.as_deref(),
        Some("NO_ERRORS_DETECTED")
    );
    assert_eq!(sleeper.count(), 0);
}

#[tokio::test]
async fn a_record_with_no_validation_status_counts_as_replicated() {
    let client = MockClient::default();
    let sleeper = RecordingSleeper::default();
    client.push_query_rows(vec![json!({ "Id": APV_ID })]);

    let record = wait_for_replication(&client, &sleeper, APV_ID, None, RetryBudget::new(5))
        .await
        .unwrap();

    assert!(record.is_some());
}

#[tokio::test]
async fn retries_at_ten_second_intervals_while_unavailable() {
    let client = MockClient::default();
    let sleeper = RecordingSleeper::default();
    client.push_query_rows(vec![row("PACKAGE_UNAVAILABLE")]);
    client.push_query_rows(vec![row("PACKAGE_UNAVAILABLE")]);
    client.push_query_rows(vec![row("NO_ERRORS_DETECTED")]);

    let record = wait_for_replication(&client, &sleeper, APV_ID, None, RetryBudget::new(5))
        .await
        .unwrap();

    assert!(record.is_some());
    assert_eq!(
        sleeper.sleeps.lock().unwrap().as_slice(),
        [Duration::from_secs(10), Duration::from_secs(10)]
    );
}

#[tokio::test]
async fn exhausting_the_budget_raises_a_timeout() {
    let client = MockClient::default();
    let sleeper = RecordingSleeper::default();
    client.push_query_rows(vec![row("PACKAGE_UNAVAILABLE")]);
    client.push_query_rows(vec![row("PACKAGE_UNAVAILABLE")]);

    let err = wait_for_replication(&client, &sleeper, APV_ID, None, RetryBudget::new(1))
        .await
        .unwrap_err();

    assert!(matches!(err, CanopyError::ReplicationTimeout));
    assert_eq!(sleeper.count(), 1);
}

#[tokio::test]
async fn uninstall_in_progress_abandons_the_wait_instead_of_failing() {
    let client = MockClient::default();
    let sleeper = RecordingSleeper::default();
    client.push_query_rows(vec![row("UNINSTALL_IN_PROGRESS")]);

    let record = wait_for_replication(&client, &sleeper, APV_ID, None, RetryBudget::new(0))
        .await
        .unwrap();

    // The install attempt surfaces its own conflict error.
    assert!(record.is_none());
}

#[tokio::test]
async fn a_missing_record_with_no_budget_is_a_timeout() {
    let client = MockClient::default();
    let sleeper = RecordingSleeper::default();
    client.push_query_rows(vec![]);

    let err = wait_for_replication(&client, &sleeper, APV_ID, None, RetryBudget::new(0))
        .await
        .unwrap_err();

    assert!(matches!(err, CanopyError::ReplicationTimeout));
}

#[tokio::test]
async fn key_restricted_queries_fall_back_to_the_unfiltered_variant() {
    let client = MockClient::default();
    let sleeper = RecordingSleeper::default();
    client.push_query_error(
        "MALFORMED_QUERY",
        "Implementation restriction: SubscriberPackageVersion only supports Id filters",
    );
    client.push_query_rows(vec![row("NO_ERRORS_DETECTED")]);

    let record = wait_for_replication(
        &client,
        &sleeper,
        APV_ID,
        Some("hunter2"),
        RetryBudget::new(0),
    )
    .await
    .unwrap();

    assert!(record.is_some());
    let queries = client.queries.lock().unwrap();
    assert_eq!(queries.len(), 2);
    assert!(queries[0].contains("InstallationKey = 'hunter2'"));
    assert!(!queries[1].contains("InstallationKey"));
}

#[tokio::test]
async fn package_unavailable_errors_are_tolerated_and_retried() {
    let client = MockClient::default();
    let sleeper = RecordingSleeper::default();
    client.push_query_error("PACKAGE_UNAVAILABLE", "package not available for install");
    client.push_query_rows(vec![row("NO_ERRORS_DETECTED")]);

    let record = wait_for_replication(&client, &sleeper, APV_ID, None, RetryBudget::new(2))
        .await
        .unwrap();

    assert!(record.is_some());
    assert_eq!(sleeper.count(), 1);
}

#[tokio::test]
async fn other_platform_errors_propagate() {
    let client = MockClient::default();
    let sleeper = RecordingSleeper::default();
    client.push_query_error("INVALID_SESSION_ID", "session expired");

    let err = wait_for_replication(&client, &sleeper, APV_ID, None, RetryBudget::new(5))
        .await
        .unwrap_err();

    assert!(matches!(err, CanopyError::Platform(platform) if platform.error_code == "INVALID_SESSION_ID"));
}
