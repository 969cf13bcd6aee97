//! Persisted status of stages and steps

use serde::{Deserialize, Serialize};

/// Status of a stage or step as recorded in the store
///
/// Lifecycle: `None -> Running -> {Success, Error, Killed}`. A stage's steps
/// only go back to `None` through an explicit reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    None,
    Success,
    Running,
    Error,
    Killed,
}

impl Status {
    /// Maps a status label reported by the execution engine to a store status.
    ///
    /// An empty label means the engine finished without recording anything
    /// more specific, which is a success.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "error" | "failure" | "failing" => Status::Error,
            "killed" => Status::Killed,
            "running" => Status::Running,
            "success" | "" => Status::Success,
            _ => Status::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::None => "none",
            Status::Success => "success",
            Status::Running => "running",
            Status::Error => "error",
            Status::Killed => "killed",
        }
    }

    /// Parses the persisted text form, falling back to `None` for unknown values
    pub fn parse(s: &str) -> Self {
        match s {
            "success" => Status::Success,
            "running" => Status::Running,
            "error" => Status::Error,
            "killed" => Status::Killed,
            _ => Status::None,
        }
    }

    /// Whether this status is one a run ends in
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Success | Status::Error | Status::Killed)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_label_mapping() {
        assert_eq!(Status::from_label("error"), Status::Error);
        assert_eq!(Status::from_label("failure"), Status::Error);
        assert_eq!(Status::from_label("failing"), Status::Error);
        assert_eq!(Status::from_label("killed"), Status::Killed);
        assert_eq!(Status::from_label("running"), Status::Running);
        assert_eq!(Status::from_label("success"), Status::Success);
        assert_eq!(Status::from_label("pending"), Status::None);
        assert_eq!(Status::from_label("skipped"), Status::None);
    }

    #[test]
    fn test_empty_label_is_success() {
        assert_eq!(Status::from_label(""), Status::Success);
        assert_eq!(Status::from_label("  "), Status::Success);
    }

    #[test]
    fn test_text_form_round_trips() {
        for status in [
            Status::None,
            Status::Success,
            Status::Running,
            Status::Error,
            Status::Killed,
        ] {
            assert_eq!(Status::parse(status.as_str()), status);
        }
        assert_eq!(Status::parse("garbage"), Status::None);
    }

    #[test]
    fn test_serializes_lowercase() {
        let json = serde_json::to_string(&Status::Running).unwrap();
        assert_eq!(json, "\"running\"");
    }
}
