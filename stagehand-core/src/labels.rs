//! Container labels attached to every executed step
//!
//! The UI finds step containers through these labels, so the keys are part of
//! the external interface.

use std::collections::BTreeMap;

/// Absolute path of the pipeline file the step belongs to
pub const LABEL_PIPELINE_FILE: &str = "io.stagehand.pipeline.file";
/// Comma separated include list the run was started with
pub const LABEL_INCLUDES: &str = "io.stagehand.pipeline.includes";
/// Comma separated exclude list the run was started with
pub const LABEL_EXCLUDES: &str = "io.stagehand.pipeline.excludes";
/// Name of the stage
pub const LABEL_STAGE_NAME: &str = "io.stagehand.stage.name";
/// Name of the step
pub const LABEL_STEP_NAME: &str = "io.stagehand.step.name";
/// 0-based position of the step in the compiled stage
pub const LABEL_STEP_NUMBER: &str = "io.stagehand.step.number";
/// Whether the step is one of the stage's services
pub const LABEL_SERVICE: &str = "io.stagehand.pipeline.service";
/// Marker on the throw-away container used to refresh the UI
pub const LABEL_UI_REFRESH: &str = "io.stagehand.ui.refresh";

/// Identification labels of one planned step
///
/// Built once while planning and never changed afterwards; the engine only
/// reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepLabels {
    pipeline_file: String,
    stage_name: String,
    step_name: String,
    step_number: usize,
    includes: Option<String>,
    excludes: Option<String>,
    service: bool,
}

impl StepLabels {
    pub fn new(
        pipeline_file: &str,
        stage_name: &str,
        step_name: &str,
        step_number: usize,
        includes: &[String],
        excludes: &[String],
        service: bool,
    ) -> Self {
        Self {
            pipeline_file: pipeline_file.to_string(),
            stage_name: stage_name.trim().to_string(),
            step_name: step_name.trim().to_string(),
            step_number,
            includes: join(includes),
            excludes: join(excludes),
            service,
        }
    }

    pub fn pipeline_file(&self) -> &str {
        &self.pipeline_file
    }

    pub fn stage_name(&self) -> &str {
        &self.stage_name
    }

    pub fn step_name(&self) -> &str {
        &self.step_name
    }

    pub fn step_number(&self) -> usize {
        self.step_number
    }

    pub fn includes(&self) -> Option<&str> {
        self.includes.as_deref()
    }

    pub fn excludes(&self) -> Option<&str> {
        self.excludes.as_deref()
    }

    pub fn is_service(&self) -> bool {
        self.service
    }

    /// Renders the labels as container label key/value pairs
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut labels = BTreeMap::new();
        labels.insert(LABEL_PIPELINE_FILE.to_string(), self.pipeline_file.clone());
        labels.insert(LABEL_STAGE_NAME.to_string(), self.stage_name.clone());
        labels.insert(LABEL_STEP_NAME.to_string(), self.step_name.clone());
        labels.insert(LABEL_STEP_NUMBER.to_string(), self.step_number.to_string());
        if let Some(includes) = &self.includes {
            labels.insert(LABEL_INCLUDES.to_string(), includes.clone());
        }
        if let Some(excludes) = &self.excludes {
            labels.insert(LABEL_EXCLUDES.to_string(), excludes.clone());
        }
        labels.insert(LABEL_SERVICE.to_string(), self.service.to_string());
        labels
    }
}

fn join(names: &[String]) -> Option<String> {
    if names.is_empty() {
        None
    } else {
        Some(names.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_lists_are_omitted() {
        let labels = StepLabels::new("/src/.drone.yml", "default", "build", 1, &[], &[], false);
        let map = labels.to_map();
        assert!(!map.contains_key(LABEL_INCLUDES));
        assert!(!map.contains_key(LABEL_EXCLUDES));
        assert_eq!(map[LABEL_STEP_NUMBER], "1");
        assert_eq!(map[LABEL_SERVICE], "false");
    }

    #[test]
    fn test_lists_are_comma_joined() {
        let include = vec!["build".to_string(), "test".to_string()];
        let labels = StepLabels::new("p", " default ", "build", 0, &include, &[], true);
        assert_eq!(labels.includes(), Some("build,test"));
        assert_eq!(labels.stage_name(), "default");
        assert_eq!(labels.to_map()[LABEL_SERVICE], "true");
    }
}
