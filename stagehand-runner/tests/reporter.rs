//! Status reporter against a live backend

mod common;

use stagehand_core::domain::status::Status;
use stagehand_core::dto::stage::{SaveStage, SaveStep};
use stagehand_manifest::Compiler;
use stagehand_runner::{Plan, PlanRequest};
use stagehand_runner::error::ReportError;
use stagehand_runner::reporter::{Reporter, ReporterConfig, StatusReporter};
use stagehand_runner::state::{ExecStatus, State, StepState};

fn state(steps: &[(&str, ExecStatus)]) -> State {
    let mut state = State::new("default");
    for (i, (name, status)) in steps.iter().enumerate() {
        state.stage.steps.push(StepState {
            name: name.to_string(),
            number: i as i64 + 1,
            status: *status,
            err_ignore: false,
            exit_code: None,
            detached: false,
        });
    }
    state
}

async fn registered(backend: &common::Backend) -> (StatusReporter, i64) {
    let reporter = StatusReporter::new(ReporterConfig {
        socket_path: backend.socket.clone(),
        pipeline_file: "p".to_string(),
    })
    .unwrap();

    let stage = SaveStage {
        name: "default".to_string(),
        pipeline_file: "p".to_string(),
        pipeline_path: String::new(),
        status: Status::None,
        steps: ["build", "test"]
            .iter()
            .enumerate()
            .map(|(i, name)| SaveStep {
                name: name.to_string(),
                image: "alpine".to_string(),
                number: i as i64 + 1,
                status: Status::None,
                err_ignore: false,
            })
            .collect(),
    };
    reporter.register(&stage).await.unwrap();

    let id = backend.client.list_stages().await.unwrap()[0].id;
    (reporter, id)
}

#[tokio::test]
async fn test_first_running_step_promotes_stage() {
    let backend = common::start_backend().await;
    let (reporter, id) = registered(&backend).await;

    let state = state(&[("build", ExecStatus::Running), ("test", ExecStatus::Pending)]);
    reporter.report_step(&state, "build").await.unwrap();

    assert_eq!(
        backend.patches(),
        vec!["PATCH /stage/status", "PATCH /step/status"]
    );
    let stage = backend.client.get_stage(id).await.unwrap();
    assert_eq!(stage.status, Status::Running);
    assert_eq!(stage.step("build").unwrap().status, Status::Running);
}

#[tokio::test]
async fn test_finishing_first_step_does_not_promote() {
    let backend = common::start_backend().await;
    let (reporter, _) = registered(&backend).await;

    let state = state(&[("build", ExecStatus::Success), ("test", ExecStatus::Pending)]);
    reporter.report_step(&state, "build").await.unwrap();

    assert_eq!(backend.patches(), vec!["PATCH /step/status"]);
}

#[tokio::test]
async fn test_later_steps_do_not_promote() {
    let backend = common::start_backend().await;
    let (reporter, id) = registered(&backend).await;

    let state = state(&[("build", ExecStatus::Success), ("test", ExecStatus::Running)]);
    reporter.report_step(&state, "test").await.unwrap();

    assert_eq!(backend.patches(), vec!["PATCH /step/status"]);
    let stage = backend.client.get_stage(id).await.unwrap();
    assert_eq!(stage.status, Status::None);
    assert_eq!(stage.step("test").unwrap().status, Status::Running);
}

#[tokio::test]
async fn test_stage_terminal_statuses() {
    let backend = common::start_backend().await;
    let (reporter, id) = registered(&backend).await;

    let mut state = state(&[("build", ExecStatus::Failure)]);
    reporter.report_step(&state, "build").await.unwrap();
    state.stage.status = ExecStatus::Failure;
    reporter.report_stage(&state).await.unwrap();

    let stage = backend.client.get_stage(id).await.unwrap();
    assert_eq!(stage.status, Status::Error);
    assert_eq!(stage.step("build").unwrap().status, Status::Error);

    state.stage.status = ExecStatus::Killed;
    reporter.report_stage(&state).await.unwrap();
    assert_eq!(backend.client.get_stage(id).await.unwrap().status, Status::Killed);
}

#[tokio::test]
async fn test_unknown_step_sends_nothing() {
    let backend = common::start_backend().await;
    let (reporter, id) = registered(&backend).await;

    let state = state(&[("build", ExecStatus::Running)]);
    let err = reporter.report_step(&state, "deploy").await.unwrap_err();
    assert!(matches!(err, ReportError::UnknownStep { .. }));

    // No promotion happened
    assert!(backend.patches().is_empty());
    assert_eq!(backend.client.get_stage(id).await.unwrap().status, Status::None);
}

#[tokio::test]
async fn test_unreachable_store_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let reporter = StatusReporter::new(ReporterConfig {
        socket_path: dir.path().join("missing.sock"),
        pipeline_file: "p".to_string(),
    })
    .unwrap();

    let mut state = state(&[]);
    state.stage.status = ExecStatus::Running;
    assert!(matches!(
        reporter.report_stage(&state).await,
        Err(ReportError::Client(_))
    ));
}

const PIPELINE: &str = r#"
kind: pipeline
name: default
steps:
  - name: build
    image: rust
  - name: test
    image: rust
  - name: deploy
    image: alpine
"#;

fn plan(include: &[&str]) -> Plan {
    Plan::build(PlanRequest {
        source: PIPELINE.to_string(),
        include: include.iter().map(|s| s.to_string()).collect(),
        pipeline_file: "/src/.drone.yml".to_string(),
        compiler: Compiler {
            clone: true,
            ..Compiler::default()
        },
        ..PlanRequest::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_filtered_then_full_registration_keeps_execution_order() {
    let backend = common::start_backend().await;
    let reporter = StatusReporter::new(ReporterConfig {
        socket_path: backend.socket.clone(),
        pipeline_file: "/src/.drone.yml".to_string(),
    })
    .unwrap();

    reporter.register(&plan(&["test"]).save_stage()).await.unwrap();
    reporter.register(&plan(&[]).save_stage()).await.unwrap();

    let stages = backend.client.list_stages().await.unwrap();
    assert_eq!(stages.len(), 1);
    let steps: Vec<(&str, i64)> = stages[0]
        .steps
        .iter()
        .map(|s| (s.name.as_str(), s.number))
        .collect();
    assert_eq!(
        steps,
        vec![("clone", 1), ("build", 2), ("test", 3), ("deploy", 4)]
    );
}
