//! Pipeline compiler
//!
//! Turns a linted [`Pipeline`] into the flat step list the engine executes.
//! The optional clone step comes first, then the services (run detached),
//! then the pipeline steps in declaration order.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use crate::definition::{Pipeline, StepDefinition, env_value};
use crate::error::CompileError;

/// Directory the workspace is mounted at inside every step container
pub const WORKSPACE: &str = "/drone/src";

const CLONE_IMAGE: &str = "docker.io/drone/git:latest";

/// What to do when a step fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrPolicy {
    Fail,
    Ignore,
}

/// When to pull the step image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullPolicy {
    Default,
    Always,
    Never,
    IfNotExists,
}

/// Compiled, executable form of a stage
#[derive(Debug, Clone)]
pub struct Spec {
    pub steps: Vec<StepSpec>,
}

/// A single compiled step
#[derive(Debug, Clone)]
pub struct StepSpec {
    pub name: String,
    pub image: String,
    pub entrypoint: Vec<String>,
    pub command: Vec<String>,
    pub environment: BTreeMap<String, String>,
    /// Labels added by the compiler; per-step identification labels are
    /// attached later, while planning
    pub labels: BTreeMap<String, String>,
    pub depends_on: Vec<String>,
    pub err_policy: ErrPolicy,
    pub pull: PullPolicy,
    pub detach: bool,
    pub privileged: bool,
    pub working_dir: String,
    /// Host directory mounted at [`WORKSPACE`], when the source is not cloned
    pub mount: Option<PathBuf>,
}

/// Compiler settings shared by every step of a run
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    /// Host directory to mount as the workspace; cloning is skipped when set
    pub mount: Option<PathBuf>,
    /// Extra environment for every step (lowest precedence)
    pub environ: BTreeMap<String, String>,
    /// Labels attached to every step
    pub labels: BTreeMap<String, String>,
    /// Add an implicit clone step unless the pipeline disables it
    pub clone: bool,
}

impl Compiler {
    /// Compile a pipeline into a step list
    ///
    /// # Errors
    /// Returns an error if a step depends on a step that does not exist or the
    /// dependencies form a cycle.
    pub fn compile(&self, pipeline: &Pipeline) -> Result<Spec, CompileError> {
        let mut steps = Vec::with_capacity(pipeline.services.len() + pipeline.steps.len() + 1);

        if self.clone && self.mount.is_none() && !pipeline.clone.disable {
            steps.push(self.clone_step(pipeline));
        }

        for service in &pipeline.services {
            let mut spec = self.compile_step(pipeline, service);
            spec.detach = true;
            steps.push(spec);
        }

        for step in &pipeline.steps {
            steps.push(self.compile_step(pipeline, step));
        }

        check_dependencies(&steps)?;

        Ok(Spec { steps })
    }

    fn compile_step(&self, pipeline: &Pipeline, step: &StepDefinition) -> StepSpec {
        let name = step.name.trim().to_string();

        let mut environment = self.environ.clone();
        for (key, value) in &pipeline.environment {
            environment.insert(key.clone(), env_value(value));
        }
        for (key, value) in &step.environment {
            environment.insert(key.clone(), env_value(value));
        }
        environment.insert("CI".to_string(), "true".to_string());
        environment.insert("DRONE".to_string(), "true".to_string());
        environment.insert("DRONE_STEP_NAME".to_string(), name.clone());
        environment.insert("DRONE_STAGE_NAME".to_string(), pipeline.name.clone());
        environment.insert("DRONE_WORKSPACE".to_string(), WORKSPACE.to_string());

        let (entrypoint, command) = if step.commands.is_empty() {
            (step.entrypoint.clone(), Vec::new())
        } else {
            (
                vec!["/bin/sh".to_string(), "-c".to_string()],
                vec![script(&step.commands)],
            )
        };

        StepSpec {
            name,
            image: step.image.trim().to_string(),
            entrypoint,
            command,
            environment,
            labels: self.labels.clone(),
            depends_on: step.depends_on.clone(),
            err_policy: if step.ignores_failure() {
                ErrPolicy::Ignore
            } else {
                ErrPolicy::Fail
            },
            pull: pull_policy(step.pull.as_deref()),
            detach: step.detach,
            privileged: step.privileged,
            working_dir: WORKSPACE.to_string(),
            mount: self.mount.clone(),
        }
    }

    fn clone_step(&self, pipeline: &Pipeline) -> StepSpec {
        let mut environment = self.environ.clone();
        environment.insert("CI".to_string(), "true".to_string());
        environment.insert("DRONE".to_string(), "true".to_string());
        environment.insert("DRONE_STEP_NAME".to_string(), "clone".to_string());
        environment.insert("DRONE_STAGE_NAME".to_string(), pipeline.name.clone());
        environment.insert("DRONE_WORKSPACE".to_string(), WORKSPACE.to_string());

        StepSpec {
            name: "clone".to_string(),
            image: CLONE_IMAGE.to_string(),
            entrypoint: Vec::new(),
            command: Vec::new(),
            environment,
            labels: self.labels.clone(),
            depends_on: Vec::new(),
            err_policy: ErrPolicy::Fail,
            pull: PullPolicy::IfNotExists,
            detach: false,
            privileged: false,
            working_dir: WORKSPACE.to_string(),
            mount: None,
        }
    }
}

/// Builds the shell script for a step's commands, echoing each one first
fn script(commands: &[String]) -> String {
    let mut script = String::from("set -e\n");
    for command in commands {
        script.push_str(&format!("echo {}\n", shell_quote(&format!("+ {}", command))));
        script.push_str(command);
        script.push('\n');
    }
    script
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r#"'"'"'"#))
}

fn pull_policy(pull: Option<&str>) -> PullPolicy {
    match pull.map(str::to_ascii_lowercase).as_deref() {
        Some("always") => PullPolicy::Always,
        Some("never") => PullPolicy::Never,
        Some("if-not-exists") => PullPolicy::IfNotExists,
        _ => PullPolicy::Default,
    }
}

fn check_dependencies(steps: &[StepSpec]) -> Result<(), CompileError> {
    let index: HashMap<&str, usize> = steps
        .iter()
        .enumerate()
        .map(|(i, s)| (s.name.as_str(), i))
        .collect();

    for step in steps {
        for dependency in &step.depends_on {
            if !index.contains_key(dependency.as_str()) {
                return Err(CompileError::UnknownDependency {
                    step: step.name.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
    }

    // 0 = unvisited, 1 = on the current path, 2 = done
    let mut marks = vec![0u8; steps.len()];
    for start in 0..steps.len() {
        visit(start, steps, &index, &mut marks)?;
    }
    Ok(())
}

fn visit(
    i: usize,
    steps: &[StepSpec],
    index: &HashMap<&str, usize>,
    marks: &mut [u8],
) -> Result<(), CompileError> {
    match marks[i] {
        2 => return Ok(()),
        1 => return Err(CompileError::Cycle(steps[i].name.clone())),
        _ => {}
    }
    marks[i] = 1;
    for dependency in &steps[i].depends_on {
        visit(index[dependency.as_str()], steps, index, marks)?;
    }
    marks[i] = 2;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn pipeline(source: &str) -> Pipeline {
        parse(source).unwrap().pipelines.remove(0)
    }

    const SOURCE: &str = r#"
kind: pipeline
name: default
environment:
  GLOBAL: one
services:
  - name: cache
    image: redis
steps:
  - name: build
    image: golang
    environment:
      GLOBAL: two
    commands:
      - go build
      - echo 'done'
  - name: notify
    image: plugins/slack
    failure: ignore
    pull: always
"#;

    #[test]
    fn test_services_come_first_and_detach() {
        let spec = Compiler::default().compile(&pipeline(SOURCE)).unwrap();
        let names: Vec<_> = spec.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["cache", "build", "notify"]);
        assert!(spec.steps[0].detach);
        assert!(!spec.steps[1].detach);
    }

    #[test]
    fn test_commands_become_shell_script() {
        let spec = Compiler::default().compile(&pipeline(SOURCE)).unwrap();
        let build = &spec.steps[1];
        assert_eq!(build.entrypoint, vec!["/bin/sh", "-c"]);
        assert!(build.command[0].starts_with("set -e\n"));
        assert!(build.command[0].contains("echo '+ go build'\ngo build\n"));
        assert!(build.command[0].contains(r#"echo '+ echo '"'"'done'"'"''"#));
        assert_eq!(build.environment["GLOBAL"], "two");
        assert_eq!(build.environment["DRONE_STEP_NAME"], "build");

        let notify = &spec.steps[2];
        assert!(notify.command.is_empty());
        assert_eq!(notify.err_policy, ErrPolicy::Ignore);
        assert_eq!(notify.pull, PullPolicy::Always);
        assert_eq!(notify.environment["GLOBAL"], "one");
    }

    #[test]
    fn test_clone_step_only_without_mount() {
        let cloning = Compiler {
            clone: true,
            ..Compiler::default()
        };
        let spec = cloning.compile(&pipeline(SOURCE)).unwrap();
        let names: Vec<_> = spec.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["clone", "cache", "build", "notify"]);
        assert!(!spec.steps[0].detach);

        let mounted = Compiler {
            clone: true,
            mount: Some(PathBuf::from("/src")),
            ..Compiler::default()
        };
        let spec = mounted.compile(&pipeline(SOURCE)).unwrap();
        assert!(spec.steps.iter().all(|s| s.name != "clone"));
        assert_eq!(spec.steps[1].mount, Some(PathBuf::from("/src")));
    }

    #[test]
    fn test_dependency_cycle_is_rejected() {
        let source = r#"
kind: pipeline
steps:
  - name: a
    image: alpine
    depends_on: [b]
  - name: b
    image: alpine
    depends_on: [a]
"#;
        let result = Compiler::default().compile(&pipeline(source));
        assert!(matches!(result, Err(CompileError::Cycle(_))));
    }

    #[test]
    fn test_unknown_dependency_is_rejected() {
        let source = "kind: pipeline\nsteps:\n  - name: a\n    image: alpine\n    depends_on: [clone]\n";
        let result = Compiler::default().compile(&pipeline(source));
        assert!(matches!(
            result,
            Err(CompileError::UnknownDependency { .. })
        ));
    }
}
