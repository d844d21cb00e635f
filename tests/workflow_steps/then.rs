//! Then steps for workflow BDD scenarios.

use super::world::{REPOSITORY, WorkflowWorld, run_async};
use rstest_bdd_macros::then;
use trellis::workflow::{
    domain::{IssueState, MergeRequestState},
    services::WorkflowError,
};

const fn error_kind(error: &WorkflowError) -> &'static str {
    match error {
        WorkflowError::NotFound(_) => "not found",
        WorkflowError::InvalidState(_) => "invalid state",
        WorkflowError::Conflict(_) => "conflict",
        WorkflowError::InvalidArgument(_) => "invalid argument",
        WorkflowError::ExternalOperationFailure(_) => "external operation failure",
        WorkflowError::Unrecorded(_) => "unrecorded",
        WorkflowError::Storage(_) => "storage",
    }
}

#[then(r#"the operation fails with "{kind}""#)]
fn operation_fails_with(world: &WorkflowWorld, kind: String) -> Result<(), eyre::Report> {
    let error = world
        .last_error
        .as_ref()
        .ok_or_else(|| eyre::eyre!("expected the last operation to fail with {kind}"))?;
    eyre::ensure!(
        error_kind(error) == kind,
        "expected {kind} error, got {error}"
    );
    Ok(())
}

#[then(r#"the issue "{title}" is "{state}""#)]
fn issue_state_is(world: &WorkflowWorld, title: String, state: String) -> Result<(), eyre::Report> {
    let expected = IssueState::try_from(state.as_str())
        .map_err(|err| eyre::eyre!("invalid expected state in scenario: {err}"))?;
    let issue = run_async(world.facade.get_issue(REPOSITORY, world.issue(&title)?))?;
    eyre::ensure!(
        issue.state() == expected,
        "expected {expected}, found {}",
        issue.state()
    );
    Ok(())
}

#[then(r#"the issue "{title}" was closed by "{user}""#)]
fn issue_closed_by(world: &WorkflowWorld, title: String, user: String) -> Result<(), eyre::Report> {
    let actor = world.user(&user)?;
    let issue = run_async(world.facade.get_issue(REPOSITORY, world.issue(&title)?))?;
    eyre::ensure!(issue.closed_by() == Some(actor.id()));
    eyre::ensure!(issue.closed_at().is_some());
    Ok(())
}

#[then(r#"the issue "{title}" has no closure record"#)]
fn issue_has_no_closure(world: &WorkflowWorld, title: String) -> Result<(), eyre::Report> {
    let issue = run_async(world.facade.get_issue(REPOSITORY, world.issue(&title)?))?;
    eyre::ensure!(issue.closed_by().is_none());
    eyre::ensure!(issue.closed_at().is_none());
    Ok(())
}

#[then(r#"the merge request is "{state}""#)]
fn merge_request_state_is(world: &WorkflowWorld, state: String) -> Result<(), eyre::Report> {
    let expected = MergeRequestState::try_from(state.as_str())
        .map_err(|err| eyre::eyre!("invalid expected state in scenario: {err}"))?;
    let merge_request = run_async(
        world
            .facade
            .get_merge_request(REPOSITORY, world.merge_request_id()?),
    )?;
    eyre::ensure!(
        merge_request.state() == expected,
        "expected {expected}, found {}",
        merge_request.state()
    );
    Ok(())
}

#[then(r#"the merge request was merged by "{user}""#)]
fn merge_request_merged_by(world: &WorkflowWorld, user: String) -> Result<(), eyre::Report> {
    let actor = world.user(&user)?;
    let merge_request = run_async(
        world
            .facade
            .get_merge_request(REPOSITORY, world.merge_request_id()?),
    )?;
    eyre::ensure!(merge_request.merged_by() == Some(actor.id()));
    eyre::ensure!(merge_request.merged_at().is_some());
    Ok(())
}

#[then(r#"issue "{issue}" depends on issue "{blocker}""#)]
fn issue_depends_on(
    world: &WorkflowWorld,
    issue: String,
    blocker: String,
) -> Result<(), eyre::Report> {
    let issue_id = world.issue(&issue)?;
    let blocker_id = world.issue(&blocker)?;
    eyre::ensure!(run_async(
        world
            .facade
            .has_dependency(REPOSITORY, issue_id, blocker_id)
    )?);
    let dependencies = run_async(world.facade.dependencies(REPOSITORY, issue_id))?;
    eyre::ensure!(dependencies.iter().any(|found| found.id() == blocker_id));
    Ok(())
}

#[then(r#"issue "{blocker}" blocks issue "{issue}""#)]
fn issue_blocks(world: &WorkflowWorld, blocker: String, issue: String) -> Result<(), eyre::Report> {
    let issue_id = world.issue(&issue)?;
    let dependents = run_async(world.facade.dependents(REPOSITORY, world.issue(&blocker)?))?;
    eyre::ensure!(dependents.iter().map(|found| found.id()).eq([issue_id]));
    Ok(())
}

#[then(r#"issue "{issue}" has no dependencies"#)]
fn issue_has_no_dependencies(world: &WorkflowWorld, issue: String) -> Result<(), eyre::Report> {
    let dependencies = run_async(world.facade.dependencies(REPOSITORY, world.issue(&issue)?))?;
    eyre::ensure!(dependencies.is_empty());
    Ok(())
}
