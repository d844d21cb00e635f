//! Merge tests against the `PostgreSQL` store.

use super::helpers::{PgEngine, PostgresCluster, WIDGETS, alice, postgres_cluster};
use rstest::rstest;
use trellis::workflow::{
    domain::{Actor, MergeRequestState},
    services::{MergeRequestDraft, WorkflowError},
};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn merged_request_cannot_be_merged_or_closed_again(
    postgres_cluster: Option<PostgresCluster>,
    alice: Actor,
) -> eyre::Result<()> {
    let Some(engine) = PgEngine::start(postgres_cluster, "merge_once").await? else {
        return Ok(());
    };
    let draft = MergeRequestDraft::new("Add search", "feature/search", "main");
    let request_id = engine.facade.create_merge_request(WIDGETS, &alice, draft).await?;

    let merged = engine.facade.merge_merge_request(WIDGETS, request_id, &alice).await?;
    let merge_again = engine.facade.merge_merge_request(WIDGETS, request_id, &alice).await;
    let close = engine.facade.close_merge_request(WIDGETS, request_id, &alice).await;

    eyre::ensure!(merged.state() == MergeRequestState::Merged);
    eyre::ensure!(merged.merged_by() == Some(alice.id()));
    eyre::ensure!(matches!(merge_again, Err(WorkflowError::InvalidState(_))));
    eyre::ensure!(matches!(close, Err(WorkflowError::InvalidState(_))));
    let stored = engine.facade.get_merge_request(WIDGETS, request_id).await?;
    eyre::ensure!(stored.state() == MergeRequestState::Merged);
    eyre::ensure!(stored.merged_at() == merged.merged_at());
    Ok(())
}
