//! In-memory integration tests for issue dependencies.

use super::helpers::{Engine, GADGETS, WIDGETS, alice, engine};
use rstest::rstest;
use trellis::workflow::{
    domain::{Actor, Issue, IssueId},
    services::{IssueDraft, WorkflowError},
};

async fn create(engine: &Engine, repository: &str, actor: &Actor, title: &str) -> IssueId {
    engine
        .facade
        .create_issue(repository, actor, IssueDraft::new(title))
        .await
        .expect("issue creation should succeed")
}

fn titles(issues: &[Issue]) -> Vec<&str> {
    issues.iter().map(|issue| issue.title().as_str()).collect()
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn release_blockers_are_tracked_in_both_directions(
    engine: Engine,
    alice: Actor,
) -> eyre::Result<()> {
    let release = create(&engine, WIDGETS, &alice, "Cut release").await;
    let docs = create(&engine, WIDGETS, &alice, "Write docs").await;
    let fix = create(&engine, WIDGETS, &alice, "Fix crash").await;

    engine.facade.add_dependency(WIDGETS, release, docs).await?;
    engine.facade.add_dependency(WIDGETS, release, fix).await?;

    let blockers = engine.facade.dependencies(WIDGETS, release).await?;
    eyre::ensure!(titles(&blockers) == ["Fix crash", "Write docs"]);
    let blocked = engine.facade.dependents(WIDGETS, docs).await?;
    eyre::ensure!(titles(&blocked) == ["Cut release"]);
    eyre::ensure!(engine.facade.has_dependency(WIDGETS, release, fix).await?);
    eyre::ensure!(!engine.facade.has_dependency(WIDGETS, fix, release).await?);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn closing_a_blocker_keeps_the_edge(engine: Engine, alice: Actor) -> eyre::Result<()> {
    let release = create(&engine, WIDGETS, &alice, "Cut release").await;
    let fix = create(&engine, WIDGETS, &alice, "Fix crash").await;
    engine.facade.add_dependency(WIDGETS, release, fix).await?;

    engine.facade.close_issue(WIDGETS, fix, &alice).await?;

    eyre::ensure!(engine.facade.has_dependency(WIDGETS, release, fix).await?);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn edges_never_cross_repositories(engine: Engine, alice: Actor) -> eyre::Result<()> {
    let widget_issue = create(&engine, WIDGETS, &alice, "Widget issue").await;
    let gadget_issue = create(&engine, GADGETS, &alice, "Gadget issue").await;

    let result = engine
        .facade
        .add_dependency(WIDGETS, widget_issue, gadget_issue)
        .await;

    eyre::ensure!(matches!(result, Err(WorkflowError::NotFound(_))));
    eyre::ensure!(engine.facade.dependencies(WIDGETS, widget_issue).await?.is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn removing_edges_is_idempotent_and_cascades_on_delete(
    engine: Engine,
    alice: Actor,
) -> eyre::Result<()> {
    let a = create(&engine, WIDGETS, &alice, "A").await;
    let b = create(&engine, WIDGETS, &alice, "B").await;
    let c = create(&engine, WIDGETS, &alice, "C").await;
    engine.facade.add_dependency(WIDGETS, a, b).await?;
    engine.facade.add_dependency(WIDGETS, b, c).await?;
    engine.facade.add_dependency(WIDGETS, c, a).await?;

    eyre::ensure!(engine.facade.remove_dependency(WIDGETS, a, b).await?);
    eyre::ensure!(!engine.facade.remove_dependency(WIDGETS, a, b).await?);

    engine.facade.delete_issue(WIDGETS, c).await?;
    eyre::ensure!(engine.facade.dependencies(WIDGETS, b).await?.is_empty());
    eyre::ensure!(engine.facade.dependents(WIDGETS, a).await?.is_empty());
    Ok(())
}
