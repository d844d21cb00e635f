//! Shared world state for workflow BDD scenarios.

use std::collections::HashMap;
use std::sync::Arc;

use mockable::DefaultClock;
use rstest::fixture;
use trellis::workflow::{
    adapters::memory::{InMemoryRepositoryDirectory, InMemoryVersionControl, InMemoryWorkflowStore},
    domain::{Actor, IssueId, MergeRequestId, RepoId, Repository, RepositoryName, UserId},
    services::{WorkflowError, WorkflowFacade},
};

/// Facade type used by the BDD world.
pub type TestFacade = WorkflowFacade<
    InMemoryWorkflowStore,
    InMemoryRepositoryDirectory,
    InMemoryVersionControl,
    DefaultClock,
>;

/// Repository every scenario operates in.
pub const REPOSITORY: &str = "acme/widgets";

/// Scenario world for workflow behaviour tests.
pub struct WorkflowWorld {
    pub facade: TestFacade,
    pub vcs: Arc<InMemoryVersionControl>,
    pub repository: Repository,
    pub users: HashMap<String, Actor>,
    pub issues: HashMap<String, IssueId>,
    pub merge_request: Option<MergeRequestId>,
    pub last_error: Option<WorkflowError>,
}

impl WorkflowWorld {
    /// Creates a world with one registered repository and no entities.
    ///
    /// # Panics
    ///
    /// Panics if the fixed repository name is rejected.
    #[must_use]
    pub fn new() -> Self {
        let repository = Repository::new(
            RepoId::new(1),
            RepositoryName::new(REPOSITORY).expect("valid repository name"),
        );
        let vcs = Arc::new(InMemoryVersionControl::new());
        let directory = InMemoryRepositoryDirectory::from_repositories([repository.clone()]);
        let facade = WorkflowFacade::new(
            Arc::new(InMemoryWorkflowStore::new()),
            Arc::new(directory),
            Arc::clone(&vcs),
            Arc::new(DefaultClock),
        );

        Self {
            facade,
            vcs,
            repository,
            users: HashMap::new(),
            issues: HashMap::new(),
            merge_request: None,
            last_error: None,
        }
    }

    /// Registers a user, assigning the next free identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the username is blank.
    pub fn add_user(&mut self, name: &str) -> Result<(), eyre::Report> {
        let next_id = i64::try_from(self.users.len())? + 1;
        let actor = Actor::new(UserId::new(next_id), name)?;
        self.users.insert(name.to_owned(), actor);
        Ok(())
    }

    /// Returns a registered user.
    ///
    /// # Errors
    ///
    /// Returns an error if the scenario never declared the user.
    pub fn user(&self, name: &str) -> Result<Actor, eyre::Report> {
        self.users
            .get(name)
            .cloned()
            .ok_or_else(|| eyre::eyre!("unknown user '{name}' in scenario world"))
    }

    /// Returns the identifier of the issue created with `title`.
    ///
    /// # Errors
    ///
    /// Returns an error if no such issue was created.
    pub fn issue(&self, title: &str) -> Result<IssueId, eyre::Report> {
        self.issues
            .get(title)
            .copied()
            .ok_or_else(|| eyre::eyre!("unknown issue '{title}' in scenario world"))
    }

    /// Returns the scenario's merge request.
    ///
    /// # Errors
    ///
    /// Returns an error if no merge request was opened.
    pub fn merge_request_id(&self) -> Result<MergeRequestId, eyre::Report> {
        self.merge_request
            .ok_or_else(|| eyre::eyre!("missing merge request in scenario world"))
    }

    /// Records the outcome of an operation under test.
    pub fn record<T>(&mut self, result: Result<T, WorkflowError>) {
        self.last_error = result.err();
    }
}

impl Default for WorkflowWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> WorkflowWorld {
    WorkflowWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
