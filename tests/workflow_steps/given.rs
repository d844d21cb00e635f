//! Given steps for workflow BDD scenarios.

use super::world::{REPOSITORY, WorkflowWorld, run_async};
use eyre::WrapErr;
use rstest_bdd_macros::given;
use trellis::workflow::{
    domain::BranchName,
    services::{IssueDraft, MergeRequestDraft},
};

#[given(r#"the user "{name}""#)]
fn user_exists(world: &mut WorkflowWorld, name: String) -> Result<(), eyre::Report> {
    world.add_user(&name)
}

#[given(r#"the branches "{source}" and "{target}" exist"#)]
fn branches_exist(
    world: &mut WorkflowWorld,
    source: String,
    target: String,
) -> Result<(), eyre::Report> {
    for name in [source, target] {
        world.vcs.add_branch(&world.repository, BranchName::new(name)?)?;
    }
    Ok(())
}

#[given(r#""{user}" has created the issue "{title}""#)]
fn issue_created(
    world: &mut WorkflowWorld,
    user: String,
    title: String,
) -> Result<(), eyre::Report> {
    let actor = world.user(&user)?;
    let issue_id = run_async(world.facade.create_issue(
        REPOSITORY,
        &actor,
        IssueDraft::new(title.as_str()),
    ))
    .wrap_err("create issue in scenario setup")?;
    world.issues.insert(title, issue_id);
    Ok(())
}

#[given(r#""{user}" has closed the issue "{title}""#)]
fn issue_closed(
    world: &mut WorkflowWorld,
    user: String,
    title: String,
) -> Result<(), eyre::Report> {
    let actor = world.user(&user)?;
    let issue_id = world.issue(&title)?;
    run_async(world.facade.close_issue(REPOSITORY, issue_id, &actor))
        .wrap_err("close issue in scenario setup")?;
    Ok(())
}

#[given(r#""{user}" has opened a merge request from "{source}" into "{target}""#)]
fn merge_request_opened(
    world: &mut WorkflowWorld,
    user: String,
    source: String,
    target: String,
) -> Result<(), eyre::Report> {
    let actor = world.user(&user)?;
    let draft = MergeRequestDraft::new(format!("Merge {source}"), source, target);
    let merge_request_id = run_async(world.facade.create_merge_request(REPOSITORY, &actor, draft))
        .wrap_err("open merge request in scenario setup")?;
    world.merge_request = Some(merge_request_id);
    Ok(())
}

#[given(r#""{user}" has closed the merge request"#)]
fn merge_request_closed(world: &mut WorkflowWorld, user: String) -> Result<(), eyre::Report> {
    let actor = world.user(&user)?;
    let merge_request_id = world.merge_request_id()?;
    run_async(
        world
            .facade
            .close_merge_request(REPOSITORY, merge_request_id, &actor),
    )
    .wrap_err("close merge request in scenario setup")?;
    Ok(())
}

#[given(r#"merges in the repository fail with "{detail}""#)]
fn merges_fail(world: &mut WorkflowWorld, detail: String) -> Result<(), eyre::Report> {
    world.vcs.fail_merges(&world.repository, detail)?;
    Ok(())
}

#[given(r#"issue "{issue}" depends on issue "{blocker}" already"#)]
fn dependency_exists(
    world: &mut WorkflowWorld,
    issue: String,
    blocker: String,
) -> Result<(), eyre::Report> {
    let issue_id = world.issue(&issue)?;
    let blocker_id = world.issue(&blocker)?;
    run_async(world.facade.add_dependency(REPOSITORY, issue_id, blocker_id))
        .wrap_err("add dependency in scenario setup")?;
    Ok(())
}
