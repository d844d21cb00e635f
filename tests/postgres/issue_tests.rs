//! Issue lifecycle tests against the `PostgreSQL` store.

use std::sync::Arc;

use super::helpers::{PgEngine, PostgresCluster, WIDGETS, alice, postgres_cluster};
use rstest::rstest;
use tokio::task::JoinSet;
use trellis::workflow::{
    domain::{Actor, IssueState},
    ports::{IssueStore, WorkflowStoreError},
    services::WorkflowError,
};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn closing_a_closed_issue_is_an_invalid_state(
    postgres_cluster: Option<PostgresCluster>,
    alice: Actor,
) -> eyre::Result<()> {
    let Some(engine) = PgEngine::start(postgres_cluster, "close_twice").await? else {
        return Ok(());
    };
    let issue_id = engine.create_issue(&alice, "Flaky login").await?;

    let closed = engine.facade.close_issue(WIDGETS, issue_id, &alice).await?;
    let again = engine.facade.close_issue(WIDGETS, issue_id, &alice).await;

    eyre::ensure!(closed.state() == IssueState::Closed);
    eyre::ensure!(closed.closed_by() == Some(alice.id()));
    eyre::ensure!(
        matches!(again, Err(WorkflowError::InvalidState(_))),
        "expected invalid state, got {again:?}"
    );
    let stored = engine.facade.get_issue(WIDGETS, issue_id).await?;
    eyre::ensure!(stored.closed_at() == closed.closed_at());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_closes_apply_exactly_once(
    postgres_cluster: Option<PostgresCluster>,
    alice: Actor,
) -> eyre::Result<()> {
    let Some(engine) = PgEngine::start(postgres_cluster, "close_race").await? else {
        return Ok(());
    };
    let issue_id = engine.create_issue(&alice, "Crash on save").await?;
    let shared = Arc::new(engine);

    let mut closes = JoinSet::new();
    for _ in 0..8 {
        let racer = Arc::clone(&shared);
        let actor = alice.clone();
        closes.spawn(async move { racer.facade.close_issue(WIDGETS, issue_id, &actor).await });
    }
    let mut applied = 0;
    let mut rejected = 0;
    while let Some(outcome) = closes.join_next().await {
        match outcome? {
            Ok(_) => applied += 1,
            Err(WorkflowError::InvalidState(_)) => rejected += 1,
            Err(other) => eyre::bail!("unexpected close failure: {other}"),
        }
    }

    eyre::ensure!(applied == 1, "{applied} closes applied");
    eyre::ensure!(rejected == 7);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn deleting_an_issue_removes_its_edges(
    postgres_cluster: Option<PostgresCluster>,
    alice: Actor,
) -> eyre::Result<()> {
    let Some(engine) = PgEngine::start(postgres_cluster, "delete_cascade").await? else {
        return Ok(());
    };
    let release = engine.create_issue(&alice, "Cut release").await?;
    let fix = engine.create_issue(&alice, "Fix crash").await?;
    let docs = engine.create_issue(&alice, "Write docs").await?;
    engine.facade.add_dependency(WIDGETS, release, fix).await?;
    engine.facade.add_dependency(WIDGETS, fix, docs).await?;

    engine.facade.delete_issue(WIDGETS, fix).await?;

    eyre::ensure!(engine.facade.dependencies(WIDGETS, release).await?.is_empty());
    eyre::ensure!(engine.facade.dependents(WIDGETS, docs).await?.is_empty());
    let missing = engine.store.get_issue(engine.widgets.id(), fix).await;
    eyre::ensure!(
        matches!(missing, Err(WorkflowStoreError::IssueNotFound { .. })),
        "expected the issue to be gone, got {missing:?}"
    );
    let remaining = engine.facade.list_all_issues(WIDGETS).await?;
    eyre::ensure!(remaining.len() == 2);
    Ok(())
}
