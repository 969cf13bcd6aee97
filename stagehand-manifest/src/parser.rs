//! Manifest parser
//!
//! A manifest is a multi-document YAML file. Every document with
//! `kind: pipeline` becomes a [`Pipeline`]; other kinds (secrets,
//! signatures) are skipped.

use serde::Deserialize;
use tracing::debug;

use crate::definition::Pipeline;
use crate::error::ManifestError;

/// All pipelines of a manifest, in file order
#[derive(Debug, Clone)]
pub struct Manifest {
    pub pipelines: Vec<Pipeline>,
}

impl Manifest {
    /// Finds the pipeline (stage) with the given name
    pub fn lookup(&self, name: &str) -> Option<&Pipeline> {
        self.pipelines.iter().find(|p| p.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.pipelines.iter().map(|p| p.name.as_str()).collect()
    }
}

/// Parse a manifest from YAML source
///
/// # Errors
/// Returns an error if:
/// - The YAML is malformed
/// - A pipeline document has fields of the wrong type
/// - No document is a pipeline
pub fn parse(source: &str) -> Result<Manifest, ManifestError> {
    let mut pipelines = Vec::new();

    for document in serde_yaml::Deserializer::from_str(source) {
        let value = serde_yaml::Value::deserialize(document)?;
        if value.is_null() {
            continue;
        }

        let kind = value
            .get("kind")
            .and_then(|k| k.as_str())
            .unwrap_or("pipeline");

        if kind != "pipeline" {
            debug!("Skipping manifest document of kind '{}'", kind);
            continue;
        }

        let pipeline: Pipeline = serde_yaml::from_value(value)?;
        pipelines.push(pipeline);
    }

    if pipelines.is_empty() {
        return Err(ManifestError::Empty);
    }

    Ok(Manifest { pipelines })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MULTI: &str = r#"
kind: pipeline
type: docker
name: default

steps:
  - name: build
    image: golang
    commands:
      - go build
  - name: test
    image: golang
    failure: ignore
    commands:
      - go test ./...

---
kind: secret
name: token
get:
  path: secrets
  name: token

---
kind: pipeline
name: release
services:
  - name: redis
    image: redis
steps:
  - name: publish
    image: plugins/docker
    environment:
      RETRIES: 3
      VERBOSE: true
"#;

    #[test]
    fn test_parse_multi_document() {
        let manifest = parse(MULTI).unwrap();
        assert_eq!(manifest.names(), vec!["default", "release"]);

        let default = manifest.lookup("default").unwrap();
        assert_eq!(default.steps.len(), 2);
        assert_eq!(default.steps[0].commands, vec!["go build"]);
        assert!(default.steps[1].ignores_failure());

        let release = manifest.lookup("release").unwrap();
        assert!(release.is_service("redis"));
        assert!(!release.is_service("publish"));
    }

    #[test]
    fn test_lookup_missing_stage() {
        let manifest = parse(MULTI).unwrap();
        assert!(manifest.lookup("nightly").is_none());
    }

    #[test]
    fn test_name_defaults_to_default() {
        let manifest = parse("kind: pipeline\nsteps:\n  - name: a\n    image: alpine\n").unwrap();
        assert!(manifest.lookup("default").is_some());
    }

    #[test]
    fn test_no_pipeline_is_an_error() {
        let result = parse("kind: secret\nname: x\n");
        assert!(matches!(result, Err(ManifestError::Empty)));
    }

    #[test]
    fn test_malformed_yaml_is_an_error() {
        let result = parse("kind: pipeline\nsteps: [\n");
        assert!(matches!(result, Err(ManifestError::Parse(_))));
    }
}
