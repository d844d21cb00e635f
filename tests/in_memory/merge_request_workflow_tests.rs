//! In-memory integration tests for merge request workflows.

use std::sync::Arc;
use std::time::Duration;

use super::helpers::{Engine, GADGETS, WIDGETS, alice, bob, branch, engine};
use rstest::rstest;
use trellis::workflow::{
    domain::{Actor, MergeRequestId, MergeRequestState},
    services::{MergeRequestDraft, WorkflowError},
};

async fn open_search_request(engine: &Engine, author: &Actor) -> MergeRequestId {
    engine
        .facade
        .create_merge_request(
            WIDGETS,
            author,
            MergeRequestDraft::new("Add search", "feature/search", "main")
                .with_description("Indexes titles"),
        )
        .await
        .expect("merge request creation should succeed")
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn merge_request_is_reviewed_closed_reopened_and_merged(
    engine: Engine,
    alice: Actor,
    bob: Actor,
) -> eyre::Result<()> {
    let merge_request_id = open_search_request(&engine, &alice).await;

    let edited = engine
        .facade
        .update_merge_request(WIDGETS, merge_request_id, "Add full-text search", "v2")
        .await?;
    eyre::ensure!(edited.title().as_str() == "Add full-text search");
    eyre::ensure!(edited.source_branch() == &branch("feature/search"));

    let closed = engine
        .facade
        .close_merge_request(WIDGETS, merge_request_id, &bob)
        .await?;
    eyre::ensure!(closed.closed_by() == Some(bob.id()));
    let merge_while_closed = engine
        .facade
        .merge_merge_request(WIDGETS, merge_request_id, &bob)
        .await;
    eyre::ensure!(matches!(
        merge_while_closed,
        Err(WorkflowError::InvalidState(_))
    ));

    engine
        .facade
        .reopen_merge_request(WIDGETS, merge_request_id)
        .await?;
    let merged = engine
        .facade
        .merge_merge_request(WIDGETS, merge_request_id, &bob)
        .await?;

    eyre::ensure!(merged.state() == MergeRequestState::Merged);
    eyre::ensure!(merged.merged_by() == Some(bob.id()));
    eyre::ensure!(merged.closed_by().is_none());
    eyre::ensure!(merged.author_id() == alice.id());

    let merges = engine.vcs.merges()?;
    let [recorded] = merges.as_slice() else {
        eyre::bail!("expected one merge commit, got {merges:?}");
    };
    eyre::ensure!(recorded.repo_id == engine.widgets.id());
    eyre::ensure!(recorded.target == branch("main"));
    eyre::ensure!(recorded.message.contains("Merged-by: bob"));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn merged_request_is_terminal(engine: Engine, alice: Actor) -> eyre::Result<()> {
    let merge_request_id = open_search_request(&engine, &alice).await;
    engine
        .facade
        .merge_merge_request(WIDGETS, merge_request_id, &alice)
        .await?;

    let close = engine
        .facade
        .close_merge_request(WIDGETS, merge_request_id, &alice)
        .await;
    let reopen = engine
        .facade
        .reopen_merge_request(WIDGETS, merge_request_id)
        .await;

    eyre::ensure!(matches!(close, Err(WorkflowError::InvalidState(_))));
    eyre::ensure!(matches!(reopen, Err(WorkflowError::InvalidState(_))));
    let merged = engine
        .facade
        .list_merge_requests_by_state(WIDGETS, MergeRequestState::Merged)
        .await?;
    eyre::ensure!(merged.len() == 1);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn branch_deleted_after_creation_fails_the_merge(
    engine: Engine,
    alice: Actor,
) -> eyre::Result<()> {
    let merge_request_id = open_search_request(&engine, &alice).await;
    engine
        .vcs
        .delete_branch(&engine.widgets, &branch("feature/search"))?;

    let result = engine
        .facade
        .merge_merge_request(WIDGETS, merge_request_id, &alice)
        .await;

    eyre::ensure!(matches!(
        result,
        Err(WorkflowError::ExternalOperationFailure(_))
    ));
    let stored = engine
        .facade
        .get_merge_request(WIDGETS, merge_request_id)
        .await?;
    eyre::ensure!(stored.state() == MergeRequestState::Open);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn racing_merges_produce_one_commit(engine: Engine, alice: Actor) -> eyre::Result<()> {
    let merge_request_id = open_search_request(&engine, &alice).await;
    engine.vcs.set_merge_delay(Duration::from_millis(10))?;
    let facade = Arc::new(engine.facade);

    let attempts: Vec<_> = (0..5)
        .map(|_| {
            let racer = Arc::clone(&facade);
            let user = alice.clone();
            tokio::spawn(async move {
                racer
                    .merge_merge_request(WIDGETS, merge_request_id, &user)
                    .await
            })
        })
        .collect();

    let mut successes = 0_usize;
    for attempt in attempts {
        match attempt.await? {
            Ok(_) => successes += 1,
            Err(WorkflowError::InvalidState(_)) => {}
            Err(other) => eyre::bail!("unexpected error {other}"),
        }
    }
    eyre::ensure!(successes == 1);
    eyre::ensure!(engine.vcs.merges()?.len() == 1);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn merges_in_different_repositories_are_independent(
    engine: Engine,
    alice: Actor,
) -> eyre::Result<()> {
    let widgets_request = open_search_request(&engine, &alice).await;
    let gadgets_request = engine
        .facade
        .create_merge_request(
            GADGETS,
            &alice,
            MergeRequestDraft::new("Export", "feature/export", "main"),
        )
        .await?;

    engine
        .facade
        .merge_merge_request(GADGETS, gadgets_request, &alice)
        .await?;
    let wrong_repository = engine
        .facade
        .merge_merge_request(GADGETS, widgets_request, &alice)
        .await;

    eyre::ensure!(matches!(wrong_repository, Err(WorkflowError::NotFound(_))));
    let widgets_open = engine
        .facade
        .list_merge_requests(WIDGETS, Some(MergeRequestState::Open))
        .await?;
    eyre::ensure!(widgets_open.len() == 1);
    let merges = engine.vcs.merges()?;
    eyre::ensure!(merges.iter().all(|merge| merge.repo_id == engine.gadgets.id()));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn deleted_merge_request_is_gone(engine: Engine, alice: Actor) -> eyre::Result<()> {
    let merge_request_id = open_search_request(&engine, &alice).await;

    engine
        .facade
        .delete_merge_request(WIDGETS, merge_request_id)
        .await?;

    let fetched = engine
        .facade
        .get_merge_request(WIDGETS, merge_request_id)
        .await;
    eyre::ensure!(matches!(fetched, Err(WorkflowError::NotFound(_))));
    eyre::ensure!(engine.facade.list_all_merge_requests(WIDGETS).await?.is_empty());
    Ok(())
}
