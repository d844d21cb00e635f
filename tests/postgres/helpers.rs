//! Shared test helpers for `PostgreSQL` integration tests.

use std::sync::Arc;

use mockable::DefaultClock;
use rstest::fixture;
use trellis::config::DatabaseConfig;
use trellis::workflow::{
    adapters::{
        memory::{InMemoryRepositoryDirectory, InMemoryVersionControl},
        postgres::PostgresWorkflowStore,
    },
    domain::{Actor, BranchName, IssueId, RepoId, Repository, RepositoryName, UserId},
    services::{IssueDraft, WorkflowFacade},
};

pub use super::cluster::{PostgresCluster, postgres_cluster};
use super::cluster::TemporaryDatabase;

/// Facade type wired over the `PostgreSQL` store.
pub type PgFacade = WorkflowFacade<
    PostgresWorkflowStore,
    InMemoryRepositoryDirectory,
    InMemoryVersionControl,
    DefaultClock,
>;

/// Name of the repository registered by [`PgEngine::start`].
pub const WIDGETS: &str = "acme/widgets";

/// Engine over a freshly migrated database of its own.
///
/// Fields drop in declaration order, so the pools close before the
/// database is dropped.
pub struct PgEngine {
    pub facade: PgFacade,
    pub store: Arc<PostgresWorkflowStore>,
    pub widgets: Repository,
    _database: TemporaryDatabase,
}

impl PgEngine {
    /// Creates and migrates a database named after `label`.
    ///
    /// Returns `None` when no cluster is available.
    ///
    /// # Errors
    ///
    /// Returns an error when the database cannot be created, connected to
    /// or migrated.
    pub async fn start(
        cluster: Option<PostgresCluster>,
        label: &str,
    ) -> eyre::Result<Option<Self>> {
        let Some(running) = cluster else {
            return Ok(None);
        };
        let database_label = label.to_owned();
        let (database, pg_store) = tokio::task::spawn_blocking(move || {
            let database = running.temporary_database(&database_label)?;
            let config = DatabaseConfig {
                url: database.url(),
                max_connections: 4,
            };
            let store = PostgresWorkflowStore::connect(&config)?;
            Ok::<_, eyre::Report>((database, store))
        })
        .await??;
        pg_store.migrate().await?;

        let widgets = Repository::new(RepoId::new(1), RepositoryName::new(WIDGETS)?);
        let vcs = Arc::new(InMemoryVersionControl::new());
        for name in ["main", "feature/search"] {
            vcs.add_branch(&widgets, BranchName::new(name)?)?;
        }
        let store = Arc::new(pg_store);
        let facade = WorkflowFacade::new(
            Arc::clone(&store),
            Arc::new(InMemoryRepositoryDirectory::from_repositories([widgets.clone()])),
            vcs,
            Arc::new(DefaultClock),
        );
        Ok(Some(Self {
            facade,
            store,
            widgets,
            _database: database,
        }))
    }

    /// Creates an issue in [`WIDGETS`].
    ///
    /// # Errors
    ///
    /// Returns an error when the facade rejects the issue.
    pub async fn create_issue(&self, actor: &Actor, title: &str) -> eyre::Result<IssueId> {
        Ok(self
            .facade
            .create_issue(WIDGETS, actor, IssueDraft::new(title))
            .await?)
    }
}

/// Provides the acting user.
#[fixture]
pub fn alice() -> Actor {
    Actor::new(UserId::new(100), "alice").expect("valid actor")
}
