//! `PostgreSQL` implementation of the workflow entity stores.

use super::{
    models::{IssueRow, MergeRequestRow, NewDependencyRow, NewIssueRow, NewMergeRequestRow},
    schema::{issue_dependencies, issues, merge_requests},
};
use crate::config::DatabaseConfig;
use crate::workflow::{
    domain::{
        BranchName, DependencyEdge, Description, Issue, IssueId, IssueState, IssueTransition,
        MergeRequest, MergeRequestId, MergeRequestState, MergeRequestTransition, NewIssue,
        NewMergeRequest, PersistedIssueData, PersistedMergeRequestData, RepoId, Title, UserId,
    },
    ports::{
        DependencyStore, IssueStore, MergeRequestStore, WorkflowStoreError, WorkflowStoreResult,
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};

/// `PostgreSQL` connection pool type used by workflow adapters.
pub type WorkflowPgPool = Pool<ConnectionManager<PgConnection>>;

/// SQL creating the workflow tables; safe to run against an existing schema.
const CREATE_SCHEMA_SQL: &str =
    include_str!("../../../../migrations/2026-10-19-000000_create_workflow_tables/up.sql");

/// `PostgreSQL`-backed store for issues, merge requests and dependency edges.
///
/// Every operation runs on the blocking thread pool with a pooled
/// connection. Guarded transitions are single conditional `UPDATE`
/// statements filtered on the required state, so concurrent callers race on
/// the row and only one of them observes a matched row.
#[derive(Debug, Clone)]
pub struct PostgresWorkflowStore {
    pool: WorkflowPgPool,
}

impl PostgresWorkflowStore {
    /// Creates a store from an existing connection pool.
    #[must_use]
    pub const fn new(pool: WorkflowPgPool) -> Self {
        Self { pool }
    }

    /// Builds a connection pool from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowStoreError::Persistence`] when the pool cannot open
    /// its initial connections.
    pub fn connect(config: &DatabaseConfig) -> WorkflowStoreResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(config.url.as_str());
        let pool = Pool::builder()
            .max_size(config.max_connections)
            .build(manager)
            .map_err(WorkflowStoreError::persistence)?;
        Ok(Self::new(pool))
    }

    /// Creates the workflow tables if they do not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowStoreError::Persistence`] when the DDL fails.
    pub async fn migrate(&self) -> WorkflowStoreResult<()> {
        self.run_blocking(|connection| {
            connection
                .batch_execute(CREATE_SCHEMA_SQL)
                .map_err(WorkflowStoreError::persistence)
        })
        .await
    }

    async fn run_blocking<F, T>(&self, f: F) -> WorkflowStoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> WorkflowStoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(WorkflowStoreError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(WorkflowStoreError::persistence)?
    }
}

#[async_trait]
impl IssueStore for PostgresWorkflowStore {
    async fn get_issue(&self, repo_id: RepoId, issue_id: IssueId) -> WorkflowStoreResult<Issue> {
        self.run_blocking(move |connection| {
            let row = issues::table
                .filter(issues::repo_id.eq(repo_id.value()))
                .filter(issues::id.eq(issue_id.value()))
                .select(IssueRow::as_select())
                .first::<IssueRow>(connection)
                .optional()?;
            row.map(row_to_issue)
                .transpose()?
                .ok_or_else(|| WorkflowStoreError::issue_not_found(repo_id, issue_id))
        })
        .await
    }

    async fn list_issues(&self, repo_id: RepoId) -> WorkflowStoreResult<Vec<Issue>> {
        self.run_blocking(move |connection| {
            let rows = issues::table
                .filter(issues::repo_id.eq(repo_id.value()))
                .order((issues::created_at.desc(), issues::id.desc()))
                .select(IssueRow::as_select())
                .load::<IssueRow>(connection)?;
            rows.into_iter().map(row_to_issue).collect()
        })
        .await
    }

    async fn list_issues_by_state(
        &self,
        repo_id: RepoId,
        state: IssueState,
    ) -> WorkflowStoreResult<Vec<Issue>> {
        self.run_blocking(move |connection| {
            let rows = issues::table
                .filter(issues::repo_id.eq(repo_id.value()))
                .filter(issues::state.eq(state.as_str()))
                .order((issues::created_at.desc(), issues::id.desc()))
                .select(IssueRow::as_select())
                .load::<IssueRow>(connection)?;
            rows.into_iter().map(row_to_issue).collect()
        })
        .await
    }

    async fn create_issue(&self, issue: &NewIssue) -> WorkflowStoreResult<IssueId> {
        let new_row = NewIssueRow {
            repo_id: issue.repo_id().value(),
            title: issue.title().as_str().to_owned(),
            description: issue.description().as_str().to_owned(),
            state: IssueState::Open.as_str().to_owned(),
            author_id: issue.author_id().value(),
            created_at: issue.created_at(),
            updated_at: issue.created_at(),
        };
        self.run_blocking(move |connection| {
            let id = diesel::insert_into(issues::table)
                .values(&new_row)
                .returning(issues::id)
                .get_result::<i64>(connection)?;
            Ok(IssueId::new(id))
        })
        .await
    }

    async fn update_issue(
        &self,
        repo_id: RepoId,
        issue_id: IssueId,
        title: &Title,
        description: &Description,
        updated_at: DateTime<Utc>,
    ) -> WorkflowStoreResult<()> {
        let new_title = title.as_str().to_owned();
        let new_description = description.as_str().to_owned();
        self.run_blocking(move |connection| {
            let updated_count = diesel::update(
                issues::table
                    .filter(issues::repo_id.eq(repo_id.value()))
                    .filter(issues::id.eq(issue_id.value())),
            )
            .set((
                issues::title.eq(new_title),
                issues::description.eq(new_description),
                issues::updated_at.eq(updated_at),
            ))
            .execute(connection)?;

            if updated_count == 0 {
                return Err(WorkflowStoreError::issue_not_found(repo_id, issue_id));
            }
            Ok(())
        })
        .await
    }

    async fn delete_issue(&self, repo_id: RepoId, issue_id: IssueId) -> WorkflowStoreResult<()> {
        self.run_blocking(move |connection| {
            let deleted_count = diesel::delete(
                issues::table
                    .filter(issues::repo_id.eq(repo_id.value()))
                    .filter(issues::id.eq(issue_id.value())),
            )
            .execute(connection)?;

            if deleted_count == 0 {
                return Err(WorkflowStoreError::issue_not_found(repo_id, issue_id));
            }
            Ok(())
        })
        .await
    }

    async fn transition_issue(
        &self,
        repo_id: RepoId,
        issue_id: IssueId,
        transition: IssueTransition,
        at: DateTime<Utc>,
    ) -> WorkflowStoreResult<usize> {
        let closure = transition.closure_at(at);
        self.run_blocking(move |connection| {
            let updated_count = diesel::update(
                issues::table
                    .filter(issues::repo_id.eq(repo_id.value()))
                    .filter(issues::id.eq(issue_id.value()))
                    .filter(issues::state.eq(transition.required_state().as_str())),
            )
            .set((
                issues::state.eq(transition.target_state().as_str()),
                issues::closed_by.eq(closure.map(|stamp| stamp.actor().value())),
                issues::closed_at.eq(closure.map(|stamp| stamp.at())),
                issues::updated_at.eq(at),
            ))
            .execute(connection)?;
            Ok(updated_count)
        })
        .await
    }
}

#[async_trait]
impl MergeRequestStore for PostgresWorkflowStore {
    async fn get_merge_request(
        &self,
        repo_id: RepoId,
        merge_request_id: MergeRequestId,
    ) -> WorkflowStoreResult<MergeRequest> {
        self.run_blocking(move |connection| {
            let row = merge_requests::table
                .filter(merge_requests::repo_id.eq(repo_id.value()))
                .filter(merge_requests::id.eq(merge_request_id.value()))
                .select(MergeRequestRow::as_select())
                .first::<MergeRequestRow>(connection)
                .optional()?;
            row.map(row_to_merge_request)
                .transpose()?
                .ok_or_else(|| {
                    WorkflowStoreError::merge_request_not_found(repo_id, merge_request_id)
                })
        })
        .await
    }

    async fn list_merge_requests(&self, repo_id: RepoId) -> WorkflowStoreResult<Vec<MergeRequest>> {
        self.run_blocking(move |connection| {
            let rows = merge_requests::table
                .filter(merge_requests::repo_id.eq(repo_id.value()))
                .order((merge_requests::created_at.desc(), merge_requests::id.desc()))
                .select(MergeRequestRow::as_select())
                .load::<MergeRequestRow>(connection)?;
            rows.into_iter().map(row_to_merge_request).collect()
        })
        .await
    }

    async fn list_merge_requests_by_state(
        &self,
        repo_id: RepoId,
        state: MergeRequestState,
    ) -> WorkflowStoreResult<Vec<MergeRequest>> {
        self.run_blocking(move |connection| {
            let rows = merge_requests::table
                .filter(merge_requests::repo_id.eq(repo_id.value()))
                .filter(merge_requests::state.eq(state.as_str()))
                .order((merge_requests::created_at.desc(), merge_requests::id.desc()))
                .select(MergeRequestRow::as_select())
                .load::<MergeRequestRow>(connection)?;
            rows.into_iter().map(row_to_merge_request).collect()
        })
        .await
    }

    async fn create_merge_request(
        &self,
        merge_request: &NewMergeRequest,
    ) -> WorkflowStoreResult<MergeRequestId> {
        let new_row = NewMergeRequestRow {
            repo_id: merge_request.repo_id().value(),
            title: merge_request.title().as_str().to_owned(),
            description: merge_request.description().as_str().to_owned(),
            source_branch: merge_request.source_branch().as_str().to_owned(),
            target_branch: merge_request.target_branch().as_str().to_owned(),
            state: MergeRequestState::Open.as_str().to_owned(),
            author_id: merge_request.author_id().value(),
            created_at: merge_request.created_at(),
            updated_at: merge_request.created_at(),
        };
        self.run_blocking(move |connection| {
            let id = diesel::insert_into(merge_requests::table)
                .values(&new_row)
                .returning(merge_requests::id)
                .get_result::<i64>(connection)?;
            Ok(MergeRequestId::new(id))
        })
        .await
    }

    async fn update_merge_request(
        &self,
        repo_id: RepoId,
        merge_request_id: MergeRequestId,
        title: &Title,
        description: &Description,
        updated_at: DateTime<Utc>,
    ) -> WorkflowStoreResult<()> {
        let new_title = title.as_str().to_owned();
        let new_description = description.as_str().to_owned();
        self.run_blocking(move |connection| {
            let updated_count = diesel::update(
                merge_requests::table
                    .filter(merge_requests::repo_id.eq(repo_id.value()))
                    .filter(merge_requests::id.eq(merge_request_id.value())),
            )
            .set((
                merge_requests::title.eq(new_title),
                merge_requests::description.eq(new_description),
                merge_requests::updated_at.eq(updated_at),
            ))
            .execute(connection)?;

            if updated_count == 0 {
                return Err(WorkflowStoreError::merge_request_not_found(
                    repo_id,
                    merge_request_id,
                ));
            }
            Ok(())
        })
        .await
    }

    async fn delete_merge_request(
        &self,
        repo_id: RepoId,
        merge_request_id: MergeRequestId,
    ) -> WorkflowStoreResult<()> {
        self.run_blocking(move |connection| {
            let deleted_count = diesel::delete(
                merge_requests::table
                    .filter(merge_requests::repo_id.eq(repo_id.value()))
                    .filter(merge_requests::id.eq(merge_request_id.value())),
            )
            .execute(connection)?;

            if deleted_count == 0 {
                return Err(WorkflowStoreError::merge_request_not_found(
                    repo_id,
                    merge_request_id,
                ));
            }
            Ok(())
        })
        .await
    }

    async fn transition_merge_request(
        &self,
        repo_id: RepoId,
        merge_request_id: MergeRequestId,
        transition: MergeRequestTransition,
        at: DateTime<Utc>,
    ) -> WorkflowStoreResult<usize> {
        self.run_blocking(move |connection| {
            let guarded = merge_requests::table
                .filter(merge_requests::repo_id.eq(repo_id.value()))
                .filter(merge_requests::id.eq(merge_request_id.value()))
                .filter(merge_requests::state.eq(transition.required_state().as_str()));
            let target_state = transition.target_state().as_str();

            let updated_count = match transition {
                MergeRequestTransition::Close { actor } => diesel::update(guarded)
                    .set((
                        merge_requests::state.eq(target_state),
                        merge_requests::closed_by.eq(Some(actor.value())),
                        merge_requests::closed_at.eq(Some(at)),
                        merge_requests::updated_at.eq(at),
                    ))
                    .execute(connection)?,
                MergeRequestTransition::Reopen => diesel::update(guarded)
                    .set((
                        merge_requests::state.eq(target_state),
                        merge_requests::closed_by.eq(None::<i64>),
                        merge_requests::closed_at.eq(None::<DateTime<Utc>>),
                        merge_requests::updated_at.eq(at),
                    ))
                    .execute(connection)?,
                MergeRequestTransition::Merge { actor } => diesel::update(guarded)
                    .set((
                        merge_requests::state.eq(target_state),
                        merge_requests::merged_by.eq(Some(actor.value())),
                        merge_requests::merged_at.eq(Some(at)),
                        merge_requests::updated_at.eq(at),
                    ))
                    .execute(connection)?,
            };
            Ok(updated_count)
        })
        .await
    }
}

#[async_trait]
impl DependencyStore for PostgresWorkflowStore {
    async fn insert_dependency(
        &self,
        repo_id: RepoId,
        edge: &DependencyEdge,
    ) -> WorkflowStoreResult<()> {
        let issue_id = edge.issue_id();
        let depends_on_id = edge.depends_on_id();
        let new_row = NewDependencyRow {
            issue_id: issue_id.value(),
            depends_on_id: depends_on_id.value(),
            created_at: edge.created_at(),
        };
        self.run_blocking(move |connection| {
            connection.transaction::<_, WorkflowStoreError, _>(|tx| {
                // Row locks keep both endpoints alive until the edge commits.
                lock_issue(tx, repo_id, issue_id)?;
                lock_issue(tx, repo_id, depends_on_id)?;

                diesel::insert_into(issue_dependencies::table)
                    .values(&new_row)
                    .execute(tx)
                    .map_err(|err| match err {
                        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                            WorkflowStoreError::DuplicateDependency {
                                issue_id,
                                depends_on_id,
                            }
                        }
                        _ => WorkflowStoreError::persistence(err),
                    })?;
                Ok(())
            })
        })
        .await
    }

    async fn delete_dependency(
        &self,
        repo_id: RepoId,
        issue_id: IssueId,
        depends_on_id: IssueId,
    ) -> WorkflowStoreResult<bool> {
        self.run_blocking(move |connection| {
            connection.transaction::<_, WorkflowStoreError, _>(|tx| {
                require_issue(tx, repo_id, issue_id)?;
                let deleted_count = diesel::delete(
                    issue_dependencies::table
                        .filter(issue_dependencies::issue_id.eq(issue_id.value()))
                        .filter(issue_dependencies::depends_on_id.eq(depends_on_id.value())),
                )
                .execute(tx)?;
                Ok(deleted_count > 0)
            })
        })
        .await
    }

    async fn dependencies_of(
        &self,
        repo_id: RepoId,
        issue_id: IssueId,
    ) -> WorkflowStoreResult<Vec<Issue>> {
        self.run_blocking(move |connection| {
            connection.transaction::<_, WorkflowStoreError, _>(|tx| {
                require_issue(tx, repo_id, issue_id)?;
                let targets = issue_dependencies::table
                    .filter(issue_dependencies::issue_id.eq(issue_id.value()))
                    .select(issue_dependencies::depends_on_id);
                let rows = issues::table
                    .filter(issues::repo_id.eq(repo_id.value()))
                    .filter(issues::id.eq_any(targets))
                    .order((issues::created_at.desc(), issues::id.desc()))
                    .select(IssueRow::as_select())
                    .load::<IssueRow>(tx)?;
                rows.into_iter().map(row_to_issue).collect()
            })
        })
        .await
    }

    async fn dependents_of(
        &self,
        repo_id: RepoId,
        issue_id: IssueId,
    ) -> WorkflowStoreResult<Vec<Issue>> {
        self.run_blocking(move |connection| {
            connection.transaction::<_, WorkflowStoreError, _>(|tx| {
                require_issue(tx, repo_id, issue_id)?;
                let sources = issue_dependencies::table
                    .filter(issue_dependencies::depends_on_id.eq(issue_id.value()))
                    .select(issue_dependencies::issue_id);
                let rows = issues::table
                    .filter(issues::repo_id.eq(repo_id.value()))
                    .filter(issues::id.eq_any(sources))
                    .order((issues::created_at.desc(), issues::id.desc()))
                    .select(IssueRow::as_select())
                    .load::<IssueRow>(tx)?;
                rows.into_iter().map(row_to_issue).collect()
            })
        })
        .await
    }

    async fn has_dependency(
        &self,
        repo_id: RepoId,
        issue_id: IssueId,
        depends_on_id: IssueId,
    ) -> WorkflowStoreResult<bool> {
        self.run_blocking(move |connection| {
            connection.transaction::<_, WorkflowStoreError, _>(|tx| {
                require_issue(tx, repo_id, issue_id)?;
                let present = diesel::select(diesel::dsl::exists(
                    issue_dependencies::table
                        .filter(issue_dependencies::issue_id.eq(issue_id.value()))
                        .filter(issue_dependencies::depends_on_id.eq(depends_on_id.value())),
                ))
                .get_result::<bool>(tx)?;
                Ok(present)
            })
        })
        .await
    }
}

fn require_issue(
    connection: &mut PgConnection,
    repo_id: RepoId,
    issue_id: IssueId,
) -> WorkflowStoreResult<()> {
    let exists = diesel::select(diesel::dsl::exists(
        issues::table
            .filter(issues::repo_id.eq(repo_id.value()))
            .filter(issues::id.eq(issue_id.value())),
    ))
    .get_result::<bool>(connection)?;

    if !exists {
        return Err(WorkflowStoreError::issue_not_found(repo_id, issue_id));
    }
    Ok(())
}

fn lock_issue(
    connection: &mut PgConnection,
    repo_id: RepoId,
    issue_id: IssueId,
) -> WorkflowStoreResult<()> {
    issues::table
        .filter(issues::repo_id.eq(repo_id.value()))
        .filter(issues::id.eq(issue_id.value()))
        .select(issues::id)
        .for_share()
        .first::<i64>(connection)
        .optional()?
        .map(|_| ())
        .ok_or_else(|| WorkflowStoreError::issue_not_found(repo_id, issue_id))
}

pub(crate) fn row_to_issue(row: IssueRow) -> WorkflowStoreResult<Issue> {
    let IssueRow {
        id,
        repo_id,
        title: persisted_title,
        description,
        state: persisted_state,
        author_id,
        closed_by,
        closed_at,
        created_at,
        updated_at,
    } = row;

    let title = Title::new(persisted_title).map_err(WorkflowStoreError::invalid_persisted_data)?;
    let state = IssueState::try_from(persisted_state.as_str())
        .map_err(WorkflowStoreError::invalid_persisted_data)?;

    let data = PersistedIssueData {
        id: IssueId::new(id),
        repo_id: RepoId::new(repo_id),
        title,
        description: Description::new(description),
        state,
        author_id: UserId::new(author_id),
        closed_by: closed_by.map(UserId::new),
        closed_at,
        created_at,
        updated_at,
    };
    Issue::from_persisted(data).map_err(WorkflowStoreError::invalid_persisted_data)
}

pub(crate) fn row_to_merge_request(row: MergeRequestRow) -> WorkflowStoreResult<MergeRequest> {
    let MergeRequestRow {
        id,
        repo_id,
        title: persisted_title,
        description,
        source_branch: persisted_source,
        target_branch: persisted_target,
        state: persisted_state,
        author_id,
        merged_by,
        merged_at,
        closed_by,
        closed_at,
        created_at,
        updated_at,
    } = row;

    let title = Title::new(persisted_title).map_err(WorkflowStoreError::invalid_persisted_data)?;
    let source_branch =
        BranchName::new(persisted_source).map_err(WorkflowStoreError::invalid_persisted_data)?;
    let target_branch =
        BranchName::new(persisted_target).map_err(WorkflowStoreError::invalid_persisted_data)?;
    let state = MergeRequestState::try_from(persisted_state.as_str())
        .map_err(WorkflowStoreError::invalid_persisted_data)?;

    let data = PersistedMergeRequestData {
        id: MergeRequestId::new(id),
        repo_id: RepoId::new(repo_id),
        title,
        description: Description::new(description),
        source_branch,
        target_branch,
        state,
        author_id: UserId::new(author_id),
        merged_by: merged_by.map(UserId::new),
        merged_at,
        closed_by: closed_by.map(UserId::new),
        closed_at,
        created_at,
        updated_at,
    };
    MergeRequest::from_persisted(data).map_err(WorkflowStoreError::invalid_persisted_data)
}
