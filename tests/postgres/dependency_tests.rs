//! Dependency edge tests against the `PostgreSQL` store.

use super::helpers::{PgEngine, PostgresCluster, WIDGETS, alice, postgres_cluster};
use mockable::DefaultClock;
use rstest::rstest;
use trellis::workflow::{
    domain::{Actor, DependencyEdge},
    ports::{DependencyStore, WorkflowStoreError},
    services::WorkflowError,
};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn duplicate_edge_is_a_conflict(
    postgres_cluster: Option<PostgresCluster>,
    alice: Actor,
) -> eyre::Result<()> {
    let Some(engine) = PgEngine::start(postgres_cluster, "duplicate_edge").await? else {
        return Ok(());
    };
    let release = engine.create_issue(&alice, "Cut release").await?;
    let fix = engine.create_issue(&alice, "Fix crash").await?;
    engine.facade.add_dependency(WIDGETS, release, fix).await?;

    let again = engine.facade.add_dependency(WIDGETS, release, fix).await;

    eyre::ensure!(
        matches!(again, Err(WorkflowError::Conflict(_))),
        "expected conflict, got {again:?}"
    );
    eyre::ensure!(engine.facade.dependencies(WIDGETS, release).await?.len() == 1);
    eyre::ensure!(engine.facade.has_dependency(WIDGETS, release, fix).await?);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn store_names_the_duplicated_pair(
    postgres_cluster: Option<PostgresCluster>,
    alice: Actor,
) -> eyre::Result<()> {
    let Some(engine) = PgEngine::start(postgres_cluster, "duplicate_pair").await? else {
        return Ok(());
    };
    let release = engine.create_issue(&alice, "Cut release").await?;
    let fix = engine.create_issue(&alice, "Fix crash").await?;
    let edge = DependencyEdge::new(release, fix, &DefaultClock)?;
    engine.store.insert_dependency(engine.widgets.id(), &edge).await?;

    let again = engine.store.insert_dependency(engine.widgets.id(), &edge).await;

    eyre::ensure!(
        matches!(
            again,
            Err(WorkflowStoreError::DuplicateDependency { issue_id, depends_on_id })
                if issue_id == release && depends_on_id == fix
        ),
        "expected duplicate dependency, got {again:?}"
    );
    // The reverse pair is a different edge.
    let reverse = DependencyEdge::new(fix, release, &DefaultClock)?;
    engine.store.insert_dependency(engine.widgets.id(), &reverse).await?;
    Ok(())
}
