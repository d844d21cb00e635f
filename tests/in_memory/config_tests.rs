//! In-memory integration tests for wiring the engine from configuration.

use std::io::Write;
use std::sync::Arc;

use mockable::DefaultClock;
use trellis::config::WorkflowConfig;
use trellis::workflow::{
    adapters::memory::{InMemoryRepositoryDirectory, InMemoryVersionControl, InMemoryWorkflowStore},
    domain::{Actor, UserId},
    services::{IssueDraft, WorkflowError, WorkflowFacade},
};

#[tokio::test(flavor = "multi_thread")]
async fn repositories_from_configuration_are_resolvable() -> eyre::Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    write!(
        file,
        r#"
        [git]
        operation_timeout_secs = 5

        [[repositories]]
        id = 10
        name = "platform/api.git"
        "#
    )?;
    let config = WorkflowConfig::load(file.path())?;
    let directory = InMemoryRepositoryDirectory::from_repositories(config.repositories()?);
    let facade = WorkflowFacade::new(
        Arc::new(InMemoryWorkflowStore::new()),
        Arc::new(directory),
        Arc::new(InMemoryVersionControl::new()),
        Arc::new(DefaultClock),
    )
    .with_merge_timeout(config.git.operation_timeout());
    let actor = Actor::new(UserId::new(1), "ci")?;

    let issue_id = facade
        .create_issue("platform/api", &actor, IssueDraft::new("Configured"))
        .await?;
    let unknown = facade
        .create_issue("platform/web", &actor, IssueDraft::new("Unconfigured"))
        .await;

    eyre::ensure!(facade.get_issue("platform/api", issue_id).await?.id() == issue_id);
    eyre::ensure!(matches!(unknown, Err(WorkflowError::NotFound(_))));
    Ok(())
}
