//! Pipeline manifest definition
//!
//! The subset of the Drone YAML format that Stagehand understands. Unknown
//! keys are ignored so manifests written for Drone still load.

use serde::Deserialize;
use std::collections::BTreeMap;

/// A `kind: pipeline` document
#[derive(Debug, Clone, Deserialize)]
pub struct Pipeline {
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default, rename = "type")]
    pub pipeline_type: Option<String>,

    #[serde(default)]
    pub clone: CloneSettings,

    #[serde(default)]
    pub environment: BTreeMap<String, serde_yaml::Value>,

    #[serde(default)]
    pub services: Vec<StepDefinition>,

    #[serde(default)]
    pub steps: Vec<StepDefinition>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CloneSettings {
    #[serde(default)]
    pub disable: bool,
}

/// A step or service entry
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StepDefinition {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub image: String,

    #[serde(default)]
    pub commands: Vec<String>,

    #[serde(default)]
    pub entrypoint: Vec<String>,

    #[serde(default)]
    pub environment: BTreeMap<String, serde_yaml::Value>,

    #[serde(default)]
    pub depends_on: Vec<String>,

    /// `ignore` lets the stage continue when this step fails
    #[serde(default)]
    pub failure: Option<String>,

    #[serde(default)]
    pub detach: bool,

    #[serde(default)]
    pub privileged: bool,

    /// `always`, `never` or `if-not-exists`
    #[serde(default)]
    pub pull: Option<String>,
}

impl Pipeline {
    /// Names of the declared services
    pub fn service_names(&self) -> impl Iterator<Item = &str> {
        self.services.iter().map(|s| s.name.trim())
    }

    /// Whether `name` is one of the declared services
    pub fn is_service(&self, name: &str) -> bool {
        self.service_names().any(|s| s == name.trim())
    }
}

impl StepDefinition {
    pub fn ignores_failure(&self) -> bool {
        self.failure
            .as_deref()
            .is_some_and(|f| f.eq_ignore_ascii_case("ignore"))
    }
}

fn default_name() -> String {
    "default".to_string()
}

/// Renders a YAML environment value as the string a container sees
pub(crate) fn env_value(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::Null => String::new(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}
