//! When steps for workflow BDD scenarios.

use super::world::{REPOSITORY, WorkflowWorld, run_async};
use rstest_bdd_macros::when;
use trellis::workflow::services::IssueDraft;

#[when(r#""{user}" creates the issue "{title}""#)]
fn create_issue(
    world: &mut WorkflowWorld,
    user: String,
    title: String,
) -> Result<(), eyre::Report> {
    let actor = world.user(&user)?;
    let result = run_async(world.facade.create_issue(
        REPOSITORY,
        &actor,
        IssueDraft::new(title.as_str()),
    ));
    if let Ok(issue_id) = result.as_ref() {
        world.issues.insert(title, *issue_id);
    }
    world.record(result);
    Ok(())
}

#[when(r#""{user}" closes the issue "{title}""#)]
fn close_issue(world: &mut WorkflowWorld, user: String, title: String) -> Result<(), eyre::Report> {
    let actor = world.user(&user)?;
    let issue_id = world.issue(&title)?;
    let result = run_async(world.facade.close_issue(REPOSITORY, issue_id, &actor));
    world.record(result);
    Ok(())
}

#[when(r#"the issue "{title}" is reopened"#)]
fn reopen_issue(world: &mut WorkflowWorld, title: String) -> Result<(), eyre::Report> {
    let issue_id = world.issue(&title)?;
    let result = run_async(world.facade.reopen_issue(REPOSITORY, issue_id));
    world.record(result);
    Ok(())
}

#[when(r#"the issue "{title}" is deleted"#)]
fn delete_issue(world: &mut WorkflowWorld, title: String) -> Result<(), eyre::Report> {
    let issue_id = world.issue(&title)?;
    let result = run_async(world.facade.delete_issue(REPOSITORY, issue_id));
    world.record(result);
    Ok(())
}

#[when(r#"issue "{issue}" is made to depend on issue "{blocker}""#)]
fn add_dependency(
    world: &mut WorkflowWorld,
    issue: String,
    blocker: String,
) -> Result<(), eyre::Report> {
    let issue_id = world.issue(&issue)?;
    let blocker_id = world.issue(&blocker)?;
    let result = run_async(world.facade.add_dependency(REPOSITORY, issue_id, blocker_id));
    world.record(result);
    Ok(())
}

#[when(r#""{user}" merges the merge request"#)]
fn merge_merge_request(world: &mut WorkflowWorld, user: String) -> Result<(), eyre::Report> {
    let actor = world.user(&user)?;
    let merge_request_id = world.merge_request_id()?;
    let result = run_async(
        world
            .facade
            .merge_merge_request(REPOSITORY, merge_request_id, &actor),
    );
    world.record(result);
    Ok(())
}

#[when(r#""{user}" closes the merge request"#)]
fn close_merge_request(world: &mut WorkflowWorld, user: String) -> Result<(), eyre::Report> {
    let actor = world.user(&user)?;
    let merge_request_id = world.merge_request_id()?;
    let result = run_async(
        world
            .facade
            .close_merge_request(REPOSITORY, merge_request_id, &actor),
    );
    world.record(result);
    Ok(())
}

#[when("the merge request is reopened")]
fn reopen_merge_request(world: &mut WorkflowWorld) -> Result<(), eyre::Report> {
    let merge_request_id = world.merge_request_id()?;
    let result = run_async(
        world
            .facade
            .reopen_merge_request(REPOSITORY, merge_request_id),
    );
    world.record(result);
    Ok(())
}
