//! In-memory workflow store for tests and local tooling.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::workflow::{
    domain::{
        DependencyEdge, Description, Issue, IssueId, IssueState, IssueTransition, MergeRequest,
        MergeRequestId, MergeRequestState, MergeRequestTransition, NewIssue, NewMergeRequest,
        RepoId, Title,
    },
    ports::{
        DependencyStore, IssueStore, MergeRequestStore, WorkflowStoreError, WorkflowStoreResult,
    },
};

/// Thread-safe in-memory store for issues, merge requests and dependency
/// edges.
///
/// All three entity kinds share one lock, so deleting an issue removes its
/// dependency edges in the same critical section. Guarded transitions are
/// checked and applied under the write lock, which gives them the same
/// compare-and-swap behaviour as the conditional `UPDATE` of the database
/// adapter.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWorkflowStore {
    state: Arc<RwLock<InMemoryWorkflowState>>,
}

#[derive(Debug, Default)]
struct InMemoryWorkflowState {
    last_issue_id: i64,
    last_merge_request_id: i64,
    issues: HashMap<IssueId, Issue>,
    merge_requests: HashMap<MergeRequestId, MergeRequest>,
    dependencies: Vec<DependencyEdge>,
}

impl InMemoryWorkflowStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> WorkflowStoreResult<RwLockReadGuard<'_, InMemoryWorkflowState>> {
        self.state.read().map_err(|err| {
            WorkflowStoreError::persistence(std::io::Error::other(err.to_string()))
        })
    }

    fn write(&self) -> WorkflowStoreResult<RwLockWriteGuard<'_, InMemoryWorkflowState>> {
        self.state.write().map_err(|err| {
            WorkflowStoreError::persistence(std::io::Error::other(err.to_string()))
        })
    }
}

impl InMemoryWorkflowState {
    fn issue(&self, repo_id: RepoId, issue_id: IssueId) -> WorkflowStoreResult<&Issue> {
        self.issues
            .get(&issue_id)
            .filter(|issue| issue.repo_id() == repo_id)
            .ok_or_else(|| WorkflowStoreError::issue_not_found(repo_id, issue_id))
    }

    fn issue_mut(&mut self, repo_id: RepoId, issue_id: IssueId) -> Option<&mut Issue> {
        self.issues
            .get_mut(&issue_id)
            .filter(|issue| issue.repo_id() == repo_id)
    }

    fn merge_request_mut(
        &mut self,
        repo_id: RepoId,
        merge_request_id: MergeRequestId,
    ) -> Option<&mut MergeRequest> {
        self.merge_requests
            .get_mut(&merge_request_id)
            .filter(|merge_request| merge_request.repo_id() == repo_id)
    }

    fn issues_by_id(&self, repo_id: RepoId, ids: impl Iterator<Item = IssueId>) -> Vec<Issue> {
        let mut found: Vec<Issue> = ids
            .filter_map(|id| self.issues.get(&id))
            .filter(|issue| issue.repo_id() == repo_id)
            .cloned()
            .collect();
        sort_issues_newest_first(&mut found);
        found
    }
}

fn sort_issues_newest_first(issues: &mut [Issue]) {
    issues.sort_by(|left, right| {
        right
            .created_at()
            .cmp(&left.created_at())
            .then_with(|| right.id().cmp(&left.id()))
    });
}

fn sort_merge_requests_newest_first(merge_requests: &mut [MergeRequest]) {
    merge_requests.sort_by(|left, right| {
        right
            .created_at()
            .cmp(&left.created_at())
            .then_with(|| right.id().cmp(&left.id()))
    });
}

#[async_trait]
impl IssueStore for InMemoryWorkflowStore {
    async fn get_issue(&self, repo_id: RepoId, issue_id: IssueId) -> WorkflowStoreResult<Issue> {
        let state = self.read()?;
        state.issue(repo_id, issue_id).cloned()
    }

    async fn list_issues(&self, repo_id: RepoId) -> WorkflowStoreResult<Vec<Issue>> {
        let state = self.read()?;
        let mut issues: Vec<Issue> = state
            .issues
            .values()
            .filter(|issue| issue.repo_id() == repo_id)
            .cloned()
            .collect();
        sort_issues_newest_first(&mut issues);
        Ok(issues)
    }

    async fn list_issues_by_state(
        &self,
        repo_id: RepoId,
        issue_state: IssueState,
    ) -> WorkflowStoreResult<Vec<Issue>> {
        let state = self.read()?;
        let mut issues: Vec<Issue> = state
            .issues
            .values()
            .filter(|issue| issue.repo_id() == repo_id && issue.state() == issue_state)
            .cloned()
            .collect();
        sort_issues_newest_first(&mut issues);
        Ok(issues)
    }

    async fn create_issue(&self, issue: &NewIssue) -> WorkflowStoreResult<IssueId> {
        let mut state = self.write()?;
        state.last_issue_id += 1;
        let issue_id = IssueId::new(state.last_issue_id);
        state
            .issues
            .insert(issue_id, Issue::from_new(issue_id, issue.clone()));
        Ok(issue_id)
    }

    async fn update_issue(
        &self,
        repo_id: RepoId,
        issue_id: IssueId,
        title: &Title,
        description: &Description,
        updated_at: DateTime<Utc>,
    ) -> WorkflowStoreResult<()> {
        let mut state = self.write()?;
        let issue = state
            .issue_mut(repo_id, issue_id)
            .ok_or_else(|| WorkflowStoreError::issue_not_found(repo_id, issue_id))?;
        issue.rewrite(title.clone(), description.clone(), updated_at);
        Ok(())
    }

    async fn delete_issue(&self, repo_id: RepoId, issue_id: IssueId) -> WorkflowStoreResult<()> {
        let mut state = self.write()?;
        state.issue(repo_id, issue_id)?;
        state.issues.remove(&issue_id);
        state.dependencies.retain(|edge| !edge.touches(issue_id));
        Ok(())
    }

    async fn transition_issue(
        &self,
        repo_id: RepoId,
        issue_id: IssueId,
        transition: IssueTransition,
        at: DateTime<Utc>,
    ) -> WorkflowStoreResult<usize> {
        let mut state = self.write()?;
        Ok(state
            .issue_mut(repo_id, issue_id)
            .map_or(0, |issue| usize::from(issue.apply_transition(transition, at))))
    }
}

#[async_trait]
impl MergeRequestStore for InMemoryWorkflowStore {
    async fn get_merge_request(
        &self,
        repo_id: RepoId,
        merge_request_id: MergeRequestId,
    ) -> WorkflowStoreResult<MergeRequest> {
        let state = self.read()?;
        state
            .merge_requests
            .get(&merge_request_id)
            .filter(|merge_request| merge_request.repo_id() == repo_id)
            .cloned()
            .ok_or_else(|| {
                WorkflowStoreError::merge_request_not_found(repo_id, merge_request_id)
            })
    }

    async fn list_merge_requests(&self, repo_id: RepoId) -> WorkflowStoreResult<Vec<MergeRequest>> {
        let state = self.read()?;
        let mut merge_requests: Vec<MergeRequest> = state
            .merge_requests
            .values()
            .filter(|merge_request| merge_request.repo_id() == repo_id)
            .cloned()
            .collect();
        sort_merge_requests_newest_first(&mut merge_requests);
        Ok(merge_requests)
    }

    async fn list_merge_requests_by_state(
        &self,
        repo_id: RepoId,
        merge_request_state: MergeRequestState,
    ) -> WorkflowStoreResult<Vec<MergeRequest>> {
        let state = self.read()?;
        let mut merge_requests: Vec<MergeRequest> = state
            .merge_requests
            .values()
            .filter(|merge_request| {
                merge_request.repo_id() == repo_id && merge_request.state() == merge_request_state
            })
            .cloned()
            .collect();
        sort_merge_requests_newest_first(&mut merge_requests);
        Ok(merge_requests)
    }

    async fn create_merge_request(
        &self,
        merge_request: &NewMergeRequest,
    ) -> WorkflowStoreResult<MergeRequestId> {
        let mut state = self.write()?;
        state.last_merge_request_id += 1;
        let merge_request_id = MergeRequestId::new(state.last_merge_request_id);
        state.merge_requests.insert(
            merge_request_id,
            MergeRequest::from_new(merge_request_id, merge_request.clone()),
        );
        Ok(merge_request_id)
    }

    async fn update_merge_request(
        &self,
        repo_id: RepoId,
        merge_request_id: MergeRequestId,
        title: &Title,
        description: &Description,
        updated_at: DateTime<Utc>,
    ) -> WorkflowStoreResult<()> {
        let mut state = self.write()?;
        let merge_request = state
            .merge_request_mut(repo_id, merge_request_id)
            .ok_or_else(|| {
                WorkflowStoreError::merge_request_not_found(repo_id, merge_request_id)
            })?;
        merge_request.rewrite(title.clone(), description.clone(), updated_at);
        Ok(())
    }

    async fn delete_merge_request(
        &self,
        repo_id: RepoId,
        merge_request_id: MergeRequestId,
    ) -> WorkflowStoreResult<()> {
        let mut state = self.write()?;
        if state.merge_request_mut(repo_id, merge_request_id).is_none() {
            return Err(WorkflowStoreError::merge_request_not_found(
                repo_id,
                merge_request_id,
            ));
        }
        state.merge_requests.remove(&merge_request_id);
        Ok(())
    }

    async fn transition_merge_request(
        &self,
        repo_id: RepoId,
        merge_request_id: MergeRequestId,
        transition: MergeRequestTransition,
        at: DateTime<Utc>,
    ) -> WorkflowStoreResult<usize> {
        let mut state = self.write()?;
        Ok(state
            .merge_request_mut(repo_id, merge_request_id)
            .map_or(0, |merge_request| {
                usize::from(merge_request.apply_transition(transition, at))
            }))
    }
}

#[async_trait]
impl DependencyStore for InMemoryWorkflowStore {
    async fn insert_dependency(
        &self,
        repo_id: RepoId,
        edge: &DependencyEdge,
    ) -> WorkflowStoreResult<()> {
        let mut state = self.write()?;
        state.issue(repo_id, edge.issue_id())?;
        state.issue(repo_id, edge.depends_on_id())?;

        let duplicate = state.dependencies.iter().any(|existing| {
            existing.issue_id() == edge.issue_id()
                && existing.depends_on_id() == edge.depends_on_id()
        });
        if duplicate {
            return Err(WorkflowStoreError::DuplicateDependency {
                issue_id: edge.issue_id(),
                depends_on_id: edge.depends_on_id(),
            });
        }

        state.dependencies.push(*edge);
        Ok(())
    }

    async fn delete_dependency(
        &self,
        repo_id: RepoId,
        issue_id: IssueId,
        depends_on_id: IssueId,
    ) -> WorkflowStoreResult<bool> {
        let mut state = self.write()?;
        state.issue(repo_id, issue_id)?;
        let before = state.dependencies.len();
        state.dependencies.retain(|edge| {
            !(edge.issue_id() == issue_id && edge.depends_on_id() == depends_on_id)
        });
        Ok(state.dependencies.len() != before)
    }

    async fn dependencies_of(
        &self,
        repo_id: RepoId,
        issue_id: IssueId,
    ) -> WorkflowStoreResult<Vec<Issue>> {
        let state = self.read()?;
        state.issue(repo_id, issue_id)?;
        let targets = state
            .dependencies
            .iter()
            .filter(|edge| edge.issue_id() == issue_id)
            .map(DependencyEdge::depends_on_id);
        Ok(state.issues_by_id(repo_id, targets))
    }

    async fn dependents_of(
        &self,
        repo_id: RepoId,
        issue_id: IssueId,
    ) -> WorkflowStoreResult<Vec<Issue>> {
        let state = self.read()?;
        state.issue(repo_id, issue_id)?;
        let sources = state
            .dependencies
            .iter()
            .filter(|edge| edge.depends_on_id() == issue_id)
            .map(DependencyEdge::issue_id);
        Ok(state.issues_by_id(repo_id, sources))
    }

    async fn has_dependency(
        &self,
        repo_id: RepoId,
        issue_id: IssueId,
        depends_on_id: IssueId,
    ) -> WorkflowStoreResult<bool> {
        let state = self.read()?;
        state.issue(repo_id, issue_id)?;
        Ok(state
            .dependencies
            .iter()
            .any(|edge| edge.issue_id() == issue_id && edge.depends_on_id() == depends_on_id))
    }
}
