//! Execution plan builder
//!
//! Parses and lints the manifest, compiles the requested stage and decides
//! which steps run. Nothing here talks to the status store.

use stagehand_core::domain::status::Status;
use stagehand_core::dto::stage::{SaveStage, SaveStep};
use stagehand_core::labels::StepLabels;
use stagehand_manifest::{Compiler, ErrPolicy, StepSpec};
use tracing::{debug, info};

use crate::error::RunError;
use crate::state::{ExecStatus, State, StepState};

const DEFAULT_STAGE: &str = "default";
const CLONE_STEP: &str = "clone";

/// Whether a planned step is executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPolicy {
    Run,
    Never,
}

/// Everything needed to plan one run
#[derive(Debug, Clone, Default)]
pub struct PlanRequest {
    /// Manifest source text
    pub source: String,
    /// Stage to run; empty means `default`
    pub stage: Option<String>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub resume_at: Option<String>,
    /// Identity of the pipeline file, used for labels, store keys and logs
    pub pipeline_file: String,
    /// Directory holding the pipeline file
    pub pipeline_path: String,
    pub compiler: Compiler,
}

#[derive(Debug, Clone)]
pub struct PlannedStep {
    pub spec: StepSpec,
    pub policy: RunPolicy,
    pub labels: StepLabels,
}

impl PlannedStep {
    pub fn name(&self) -> &str {
        &self.spec.name
    }
}

#[derive(Debug, Clone)]
pub struct Plan {
    pub pipeline_file: String,
    pub pipeline_path: String,
    pub stage_name: String,
    /// Every compiled step, including the ones that never run
    pub steps: Vec<PlannedStep>,
    /// Initial run state holding only the steps that run
    pub state: State,
}

impl Plan {
    pub fn build(req: PlanRequest) -> Result<Self, RunError> {
        let stage_name = match req.stage.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                info!("No stage specified, assuming '{}'", DEFAULT_STAGE);
                DEFAULT_STAGE.to_string()
            }
        };

        let manifest = stagehand_manifest::parse(&req.source)?;
        let pipeline = manifest
            .lookup(&stage_name)
            .ok_or_else(|| RunError::StageNotFound {
                stage: stage_name.clone(),
                available: manifest.names().into_iter().map(str::to_string).collect(),
            })?;

        stagehand_manifest::lint(pipeline)?;
        let spec = req.compiler.compile(pipeline)?;

        let mut steps: Vec<PlannedStep> = spec
            .steps
            .into_iter()
            .enumerate()
            .map(|(i, spec)| {
                let labels = StepLabels::new(
                    &req.pipeline_file,
                    &pipeline.name,
                    &spec.name,
                    i,
                    &req.include,
                    &req.exclude,
                    pipeline.is_service(&spec.name),
                );
                PlannedStep {
                    spec,
                    policy: RunPolicy::Run,
                    labels,
                }
            })
            .collect();

        apply_filters(
            &mut steps,
            &req.include,
            &req.exclude,
            req.resume_at.as_deref(),
        );

        let mut state = State::new(stage_name.clone());
        for step in steps.iter().filter(|s| s.policy == RunPolicy::Run) {
            state.stage.steps.push(StepState {
                name: step.spec.name.clone(),
                number: state.stage.steps.len() as i64 + 1,
                status: ExecStatus::Pending,
                err_ignore: step.spec.err_policy == ErrPolicy::Ignore,
                exit_code: None,
                detached: step.spec.detach,
            });
        }

        debug!(
            "Planned stage {}: {} of {} step(s) run",
            stage_name,
            state.stage.steps.len(),
            steps.len()
        );

        Ok(Self {
            pipeline_file: req.pipeline_file,
            pipeline_path: req.pipeline_path,
            stage_name,
            steps,
            state,
        })
    }

    /// Steps that run, in order
    pub fn runnable(&self) -> impl Iterator<Item = &PlannedStep> {
        self.steps.iter().filter(|s| s.policy == RunPolicy::Run)
    }

    /// Registration payload for the status store: the stage and the steps
    /// that run, all with status `none`
    pub fn save_stage(&self) -> SaveStage {
        SaveStage {
            name: self.stage_name.clone(),
            pipeline_file: self.pipeline_file.clone(),
            pipeline_path: self.pipeline_path.clone(),
            status: Status::None,
            steps: self
                .runnable()
                .zip(&self.state.stage.steps)
                .map(|(planned, state)| SaveStep {
                    name: state.name.clone(),
                    image: planned.spec.image.clone(),
                    number: state.number,
                    status: Status::None,
                    err_ignore: state.err_ignore,
                })
                .collect(),
        }
    }
}

/// Sets run policies from the include, exclude and resume-at settings.
/// The clone step is never filtered out.
fn apply_filters(
    steps: &mut [PlannedStep],
    include: &[String],
    exclude: &[String],
    resume_at: Option<&str>,
) {
    let listed = |names: &[String], step: &str| names.iter().any(|n| n == step);

    if !include.is_empty() {
        for step in steps.iter_mut().filter(|s| s.name() != CLONE_STEP) {
            if !listed(include, step.name()) {
                step.policy = RunPolicy::Never;
            }
        }
    } else if !exclude.is_empty() {
        for step in steps.iter_mut().filter(|s| s.name() != CLONE_STEP) {
            if listed(exclude, step.name()) {
                step.policy = RunPolicy::Never;
            }
        }
    }

    if let Some(resume_at) = resume_at.filter(|r| !r.is_empty()) {
        for step in steps.iter_mut() {
            if step.name() == resume_at {
                break;
            }
            if step.name() != CLONE_STEP && listed(exclude, step.name()) {
                step.policy = RunPolicy::Never;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"
kind: pipeline
name: default
services:
  - name: db
    image: postgres
steps:
  - name: build
    image: rust
    commands: [cargo build]
  - name: test
    image: rust
    failure: ignore
    commands: [cargo test]
  - name: deploy
    image: alpine
    commands: [./deploy.sh]
---
kind: pipeline
name: nightly
steps:
  - name: bench
    image: rust
"#;

    fn request(include: &[&str], exclude: &[&str], resume_at: Option<&str>) -> PlanRequest {
        PlanRequest {
            source: SOURCE.to_string(),
            stage: None,
            include: include.iter().map(|s| s.to_string()).collect(),
            exclude: exclude.iter().map(|s| s.to_string()).collect(),
            resume_at: resume_at.map(str::to_string),
            pipeline_file: "/src/.drone.yml".to_string(),
            pipeline_path: "/src".to_string(),
            compiler: Compiler {
                clone: true,
                ..Compiler::default()
            },
        }
    }

    fn running(plan: &Plan) -> Vec<&str> {
        plan.state
            .stage
            .steps
            .iter()
            .map(|s| s.name.as_str())
            .collect()
    }

    #[test]
    fn test_default_stage_runs_everything() {
        let plan = Plan::build(request(&[], &[], None)).unwrap();
        assert_eq!(plan.stage_name, "default");
        assert_eq!(running(&plan), vec!["clone", "db", "build", "test", "deploy"]);
    }

    #[test]
    fn test_include_keeps_clone() {
        let plan = Plan::build(request(&["build"], &[], None)).unwrap();
        assert_eq!(running(&plan), vec!["clone", "build"]);
    }

    #[test]
    fn test_exclude_keeps_clone() {
        let plan = Plan::build(request(&[], &["deploy", "clone"], None)).unwrap();
        assert_eq!(running(&plan), vec!["clone", "db", "build", "test"]);
    }

    #[test]
    fn test_include_wins_over_exclude() {
        let plan = Plan::build(request(&["build", "test"], &["test"], None)).unwrap();
        assert_eq!(running(&plan), vec!["clone", "build", "test"]);
    }

    #[test]
    fn test_resume_at_only_drops_excluded_steps_before_it() {
        let plan = Plan::build(request(&["db", "build", "deploy"], &["db"], Some("deploy"))).unwrap();
        assert_eq!(running(&plan), vec!["clone", "build", "deploy"]);

        let plan = Plan::build(request(&[], &[], Some("test"))).unwrap();
        assert_eq!(running(&plan), vec!["clone", "db", "build", "test", "deploy"]);
    }

    #[test]
    fn test_numbers_are_contiguous_from_one() {
        let plan = Plan::build(request(&[], &["build"], None)).unwrap();
        let numbers: Vec<i64> = plan.state.stage.steps.iter().map(|s| s.number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_labels_use_compiled_position() {
        let plan = Plan::build(request(&["build"], &["deploy"], None)).unwrap();
        let build = plan.steps.iter().find(|s| s.name() == "build").unwrap();
        assert_eq!(build.labels.step_number(), 2);
        assert_eq!(build.labels.includes(), Some("build"));
        assert_eq!(build.labels.excludes(), Some("deploy"));
        assert!(!build.labels.is_service());

        let db = plan.steps.iter().find(|s| s.name() == "db").unwrap();
        assert!(db.labels.is_service());
        assert_eq!(db.policy, RunPolicy::Never);
    }

    #[test]
    fn test_err_ignore_and_detach_carried_into_state() {
        let plan = Plan::build(request(&[], &[], None)).unwrap();
        let (_, test) = plan.state.find_step("test").unwrap();
        assert!(test.err_ignore);
        let (_, db) = plan.state.find_step("db").unwrap();
        assert!(db.detached);
    }

    #[test]
    fn test_named_stage_and_missing_stage() {
        let mut req = request(&[], &[], None);
        req.stage = Some("nightly".to_string());
        let plan = Plan::build(req).unwrap();
        assert_eq!(running(&plan), vec!["clone", "bench"]);

        let mut req = request(&[], &[], None);
        req.stage = Some("weekly".to_string());
        match Plan::build(req) {
            Err(RunError::StageNotFound { stage, available }) => {
                assert_eq!(stage, "weekly");
                assert_eq!(available, vec!["default", "nightly"]);
            }
            other => panic!("expected StageNotFound, got {:?}", other.map(|p| p.stage_name)),
        }
    }

    #[test]
    fn test_save_stage_lists_running_steps() {
        let plan = Plan::build(request(&["build"], &[], None)).unwrap();
        let stage = plan.save_stage();
        assert_eq!(stage.name, "default");
        assert_eq!(stage.pipeline_file, "/src/.drone.yml");
        let steps: Vec<(&str, i64)> = stage
            .steps
            .iter()
            .map(|s| (s.name.as_str(), s.number))
            .collect();
        assert_eq!(steps, vec![("clone", 1), ("build", 2)]);
        assert!(stage.steps.iter().all(|s| s.status == Status::None));
    }
}
