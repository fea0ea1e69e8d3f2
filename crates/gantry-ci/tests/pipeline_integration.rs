//! Integration tests for workflow execution: fail-fast aborts,
//! environment visibility, bounded admission, idempotence.

use gantry_ci::{
    ActionRegistry, Pipeline, RunStatus, Scheduler, StageSpec, StepSpec, Trigger, Workflow,
};

fn push() -> Trigger {
    Trigger::push(".")
}

/// The canonical fail-fast scenario: setup passes, install fails, test
/// must never execute.
#[tokio::test]
async fn test_fail_fast_skips_later_stages() {
    let scratch = tempfile::tempdir().expect("tempdir failed");
    let probe = scratch.path().join("ran-test");

    let workflow = Workflow::new(
        "ci",
        vec![
            StageSpec::new("setup", vec![StepSpec::shell("echo path-setup")]),
            StageSpec::new("install", vec![StepSpec::shell("exit 1")]),
            StageSpec::new(
                "test",
                vec![StepSpec::shell(format!("touch {}", probe.display()))],
            ),
        ],
    );

    let result = Pipeline::execute(&workflow, &push(), &ActionRegistry::empty())
        .await
        .expect("execute failed");

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.failed_stage.as_deref(), Some("install"));
    assert_eq!(result.stage_names(), vec!["setup", "install"]);
    assert!(
        !probe.exists(),
        "stage after the failure must never execute"
    );

    let install = &result.stages[1];
    assert_eq!(install.exit_code(), 1);
}

/// All-green run: succeeded, and each stage's log reflects exactly its
/// declared steps in declared order.
#[tokio::test]
async fn test_all_green_logs_match_declared_steps() {
    let workflow = Workflow::new(
        "ci",
        vec![
            StageSpec::new(
                "setup",
                vec![
                    StepSpec::shell("echo one").named("first"),
                    StepSpec::shell("echo two").named("second"),
                ],
            ),
            StageSpec::new("test", vec![StepSpec::shell("echo run-tests").named("pytest")]),
        ],
    );

    let result = Pipeline::execute(&workflow, &push(), &ActionRegistry::empty())
        .await
        .expect("execute failed");

    assert_eq!(result.status, RunStatus::Succeeded);
    assert_eq!(result.passed_count(), 2);
    assert_eq!(result.stages[0].step_labels(), vec!["first", "second"]);
    assert_eq!(result.stages[1].step_labels(), vec!["pytest"]);
    assert!(result.stages[1].steps[0].stdout.contains("run-tests"));
}

/// Environment mutations from stage 1 are visible to stage 2 of the same
/// run: declared variable writes and search-path appends both.
#[tokio::test]
async fn test_env_mutations_visible_across_stages() {
    use std::os::unix::fs::PermissionsExt;

    let scratch = tempfile::tempdir().expect("tempdir failed");
    let tool = scratch.path().join("fake-tool");
    std::fs::write(&tool, "#!/bin/sh\necho provisioned-tool\n").expect("write failed");
    std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755))
        .expect("chmod failed");

    let workflow = Workflow::new(
        "ci",
        vec![
            StageSpec::new(
                "setup",
                vec![StepSpec::shell("true")
                    .with_env("GREETING", "hello")
                    .with_path(scratch.path())],
            ),
            StageSpec::new(
                "verify",
                vec![
                    StepSpec::shell("test \"$GREETING\" = hello"),
                    StepSpec::shell("fake-tool"),
                ],
            ),
        ],
    );

    let result = Pipeline::execute(&workflow, &push(), &ActionRegistry::empty())
        .await
        .expect("execute failed");

    assert_eq!(result.status, RunStatus::Succeeded, "{result:?}");
    assert!(result.stages[1].steps[1].stdout.contains("provisioned-tool"));
}

/// A run's environment has no effect on a concurrently executing run.
#[tokio::test]
async fn test_env_isolated_between_concurrent_runs() {
    let scheduler = Scheduler::with_actions(2, ActionRegistry::empty());

    let writer = Workflow::new(
        "writer",
        vec![StageSpec::new(
            "setup",
            vec![StepSpec::shell("sleep 0.2").with_env("GANTRY_PROBE", "leaked")],
        )],
    );
    let reader = Workflow::new(
        "reader",
        vec![StageSpec::new(
            "verify",
            vec![StepSpec::shell("sleep 0.1; test -z \"$GANTRY_PROBE\"")],
        )],
    );

    let writer_handle = scheduler.submit(writer, push());
    let reader_handle = scheduler.submit(reader, push());

    let writer_result = writer_handle.await.unwrap().expect("writer run failed");
    let reader_result = reader_handle.await.unwrap().expect("reader run failed");

    assert!(writer_result.succeeded());
    assert!(
        reader_result.succeeded(),
        "writer's environment must not leak into the reader run"
    );
}

/// With `max_parallel = 2` and 3 simultaneous runs, the first two overlap
/// and the third starts only after one of them reaches a terminal state.
#[tokio::test]
async fn test_admission_cap_bounds_concurrency() {
    let scheduler = Scheduler::with_actions(2, ActionRegistry::empty());

    let workflow = |name: &str| {
        Workflow::new(
            name,
            vec![StageSpec::new("work", vec![StepSpec::shell("sleep 0.3")])],
        )
    };

    let first = scheduler.submit(workflow("first"), push());
    let second = scheduler.submit(workflow("second"), push());
    let third = scheduler.submit(workflow("third"), push());

    let first = first.await.unwrap().expect("first run failed");
    let second = second.await.unwrap().expect("second run failed");
    let third = third.await.unwrap().expect("third run failed");

    // First two hold both slots, so they overlap.
    assert!(first.started_at < second.finished_at);
    assert!(second.started_at < first.finished_at);

    // Third waited for a slot.
    let earliest_finish = first.finished_at.min(second.finished_at);
    assert!(
        third.started_at >= earliest_finish,
        "third run must start only after a slot frees"
    );
}

/// Admission follows submission order: with a single slot, runs start in
/// the order they were triggered.
#[tokio::test]
async fn test_admission_order_is_fifo() {
    let scheduler = Scheduler::with_actions(1, ActionRegistry::empty());

    let workflow = |name: &str| {
        Workflow::new(
            name,
            vec![StageSpec::new("work", vec![StepSpec::shell("sleep 0.05")])],
        )
    };

    let handles = vec![
        scheduler.submit(workflow("first"), push()),
        scheduler.submit(workflow("second"), push()),
        scheduler.submit(workflow("third"), push()),
    ];

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap().expect("run failed"));
    }

    assert!(results[0].started_at <= results[1].started_at);
    assert!(results[1].started_at <= results[2].started_at);
    assert!(results[0].finished_at <= results[1].started_at);
    assert!(results[1].finished_at <= results[2].started_at);
}

/// Re-executing an identical all-green workflow yields the same status
/// and the same ordered stage names.
#[tokio::test]
async fn test_rerun_is_structurally_idempotent() {
    let workflow = Workflow::new(
        "ci",
        vec![
            StageSpec::new("setup", vec![StepSpec::shell("echo setup")]),
            StageSpec::new("test", vec![StepSpec::shell("echo test")]),
        ],
    );

    let first = Pipeline::execute(&workflow, &push(), &ActionRegistry::empty())
        .await
        .expect("first run failed");
    let second = Pipeline::execute(&workflow, &push(), &ActionRegistry::empty())
        .await
        .expect("second run failed");

    assert_eq!(first.status, RunStatus::Succeeded);
    assert_eq!(second.status, RunStatus::Succeeded);
    assert_eq!(first.stage_names(), second.stage_names());
    assert_eq!(first.stages_digest, second.stages_digest);
    assert_ne!(first.run_id, second.run_id, "each trigger gets its own run");
}

/// A provisioning step that cannot reach its registry is just a failing
/// step: same fail-fast handling, no special kind.
#[tokio::test]
async fn test_provisioning_failure_is_ordinary_step_failure() {
    let mut actions = ActionRegistry::empty();
    actions.register("setup-pkgs@v1", |_with, _env| {
        Ok(vec![vec![
            "sh".to_string(),
            "-c".to_string(),
            "echo 'could not reach registry' >&2; exit 7".to_string(),
        ]])
    });

    let workflow = Workflow::new(
        "ci",
        vec![
            StageSpec::new("provision", vec![StepSpec::action("setup-pkgs@v1")]),
            StageSpec::new("test", vec![StepSpec::shell("echo never")]),
        ],
    );

    let scheduler = Scheduler::with_actions(1, actions);
    let result = scheduler.run(&workflow, &push()).await.expect("run failed");

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.failed_stage.as_deref(), Some("provision"));
    assert_eq!(result.stages.len(), 1);
    assert_eq!(result.stages[0].exit_code(), 7);
    assert!(result.stages[0].steps[0]
        .stderr
        .contains("could not reach registry"));
}

/// Actions resolved through the registry can provision the run
/// environment for later stages.
#[tokio::test]
async fn test_action_provisioning_feeds_later_stages() {
    use std::os::unix::fs::PermissionsExt;

    let scratch = tempfile::tempdir().expect("tempdir failed");
    let bin = scratch.path().join("bin");
    std::fs::create_dir(&bin).expect("mkdir failed");
    let tool = bin.join("managed-tool");
    std::fs::write(&tool, "#!/bin/sh\necho managed-ok\n").expect("write failed");
    std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755))
        .expect("chmod failed");

    let mut actions = ActionRegistry::empty();
    let bin_for_action = bin.clone();
    actions.register("setup-tool@v1", move |_with, env| {
        env.append_path(bin_for_action.clone());
        env.register_package("managed-tool");
        Ok(vec![])
    });

    let workflow = Workflow::new(
        "ci",
        vec![
            StageSpec::new("provision", vec![StepSpec::action("setup-tool@v1")]),
            StageSpec::new("use", vec![StepSpec::shell("managed-tool")]),
        ],
    );

    let scheduler = Scheduler::with_actions(1, actions);
    let result = scheduler.run(&workflow, &push()).await.expect("run failed");

    assert_eq!(result.status, RunStatus::Succeeded, "{result:?}");
    assert!(result.stages[1].steps[0].stdout.contains("managed-ok"));
}
