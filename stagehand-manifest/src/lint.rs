//! Pipeline linter
//!
//! Rejects pipelines the compiler or engine could not run meaningfully.

use std::collections::HashSet;

use crate::definition::Pipeline;
use crate::error::ManifestError;

/// Lint a single pipeline, collecting every problem found
pub fn lint(pipeline: &Pipeline) -> Result<(), ManifestError> {
    let mut problems = Vec::new();
    let mut names = HashSet::new();

    if pipeline.name.trim().is_empty() {
        problems.push("pipeline name cannot be empty".to_string());
    }

    for entry in pipeline.services.iter().chain(pipeline.steps.iter()) {
        let name = entry.name.trim();
        if name.is_empty() {
            problems.push("every step and service needs a name".to_string());
            continue;
        }
        if !names.insert(name) {
            problems.push(format!("duplicate step name '{}'", name));
        }
        if entry.image.trim().is_empty() {
            problems.push(format!("step '{}' has no image", name));
        }
    }

    for step in &pipeline.steps {
        for dependency in &step.depends_on {
            if dependency != "clone" && !names.contains(dependency.as_str()) {
                problems.push(format!(
                    "step '{}' depends on unknown step '{}'",
                    step.name, dependency
                ));
            }
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(ManifestError::Lint {
            pipeline: pipeline.name.clone(),
            problems,
        })
    }
}
