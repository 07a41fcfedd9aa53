//! Fix plans parsed from model responses.
//!
//! The model's JSON is untrusted, so it is read into a loose wire shape
//! first and then validated into [`FixPlan`]. An unknown action or a
//! missing required field rejects the whole plan. Path containment is
//! checked later, per fix, by the applicator.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::FixPlanError;
use crate::utils::json_extraction::try_extract_json_object;

/// What to do with one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum FixAction {
    /// Create the file (and its parents), overwriting if it exists.
    Add { content: String },
    /// Overwrite an existing file. Skipped if the file does not exist.
    Modify { content: String },
    /// Remove the file if present.
    Delete,
}

impl FixAction {
    /// Lowercase action name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            FixAction::Add { .. } => "add",
            FixAction::Modify { .. } => "modify",
            FixAction::Delete => "delete",
        }
    }
}

impl fmt::Display for FixAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single file mutation proposed by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFix {
    /// Target path, relative to the project root. Not yet checked for
    /// containment.
    pub file: String,
    #[serde(flatten)]
    pub action: FixAction,
    pub description: String,
}

/// A validated fix plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixPlan {
    pub analysis: String,
    pub fixes: Vec<FileFix>,
    pub commands: Vec<String>,
    /// Model's self-reported confidence, clamped to `[0, 1]`.
    pub confidence: f64,
}

#[derive(Debug, Deserialize)]
struct RawPlan {
    #[serde(default)]
    analysis: Option<String>,
    #[serde(default)]
    fixes: Vec<RawFix>,
    #[serde(default)]
    commands: Vec<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawFix {
    #[serde(default)]
    file: Option<String>,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl RawFix {
    fn validate(self, index: usize) -> Result<FileFix, FixPlanError> {
        let file = self
            .file
            .filter(|f| !f.trim().is_empty())
            .ok_or(FixPlanError::MissingField {
                index,
                field: "file",
            })?;
        let action_name = self.action.ok_or(FixPlanError::MissingField {
            index,
            field: "action",
        })?;

        let missing_content = FixPlanError::MissingField {
            index,
            field: "content",
        };
        let action = match action_name.trim().to_ascii_lowercase().as_str() {
            "add" => FixAction::Add {
                content: self.content.ok_or(missing_content)?,
            },
            "modify" => FixAction::Modify {
                content: self.content.ok_or(missing_content)?,
            },
            "delete" => FixAction::Delete,
            _ => {
                return Err(FixPlanError::UnknownAction {
                    index,
                    action: action_name,
                })
            }
        };

        Ok(FileFix {
            file: file.trim().to_string(),
            action,
            description: self.description.unwrap_or_default(),
        })
    }
}

impl FixPlan {
    /// Parses and validates a raw model response.
    pub fn parse(response: &str) -> Result<Self, FixPlanError> {
        let json = try_extract_json_object(response)
            .into_result()
            .map_err(|e| FixPlanError::NoJson(e.to_string()))?;

        let raw: RawPlan = serde_json::from_str(&json)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawPlan) -> Result<Self, FixPlanError> {
        let fixes = raw
            .fixes
            .into_iter()
            .enumerate()
            .map(|(index, fix)| fix.validate(index))
            .collect::<Result<Vec<_>, _>>()?;

        let commands = raw
            .commands
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();

        let confidence = match raw.confidence {
            Some(c) if !(0.0..=1.0).contains(&c) => {
                warn!(confidence = c, "Clamping out-of-range confidence");
                c.clamp(0.0, 1.0)
            }
            Some(c) => c,
            None => 0.0,
        };

        Ok(Self {
            analysis: raw.analysis.unwrap_or_default(),
            fixes,
            commands,
            confidence,
        })
    }

    /// Whether the plan proposes nothing at all.
    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty() && self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_plan() {
        let response = r#"{
            "analysis": "Missing import",
            "fixes": [
                {"file": "app/Foo.kt", "action": "modify", "content": "package app\n", "description": "add import"},
                {"file": "app/Old.kt", "action": "DELETE", "description": "unused"},
                {"file": "app/New.kt", "action": "add", "content": ""}
            ],
            "commands": ["./gradlew clean", "   "],
            "confidence": 0.8
        }"#;

        let plan = FixPlan::parse(response).expect("plan should parse");
        assert_eq!(plan.analysis, "Missing import");
        assert_eq!(plan.fixes.len(), 3);
        assert_eq!(
            plan.fixes[0].action,
            FixAction::Modify {
                content: "package app\n".to_string()
            }
        );
        assert_eq!(plan.fixes[1].action, FixAction::Delete);
        assert_eq!(plan.fixes[2].description, "");
        assert_eq!(plan.commands, vec!["./gradlew clean"]);
        assert!((plan.confidence - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_fenced_response() {
        let response = "Here you go:\n```json\n{\"analysis\": \"ok\", \"fixes\": []}\n```";
        let plan = FixPlan::parse(response).expect("plan should parse");
        assert_eq!(plan.analysis, "ok");
        assert!(plan.is_empty());
        assert_eq!(plan.confidence, 0.0);
    }

    #[test]
    fn test_unknown_action_rejects_plan() {
        let response = r#"{"fixes": [{"file": "a.kt", "action": "rename", "content": "x"}]}"#;
        assert!(matches!(
            FixPlan::parse(response),
            Err(FixPlanError::UnknownAction { index: 0, ref action }) if action == "rename"
        ));
    }

    #[test]
    fn test_missing_fields_reject_plan() {
        let no_file = r#"{"fixes": [{"action": "add", "content": "x"}]}"#;
        assert!(matches!(
            FixPlan::parse(no_file),
            Err(FixPlanError::MissingField { field: "file", .. })
        ));

        let no_content = r#"{"fixes": [{"file": "a.kt", "action": "modify"}]}"#;
        assert!(matches!(
            FixPlan::parse(no_content),
            Err(FixPlanError::MissingField { field: "content", .. })
        ));

        let no_action = r#"{"fixes": [{"file": "a.kt"}]}"#;
        assert!(matches!(
            FixPlan::parse(no_action),
            Err(FixPlanError::MissingField { field: "action", .. })
        ));
    }

    #[test]
    fn test_non_json_response() {
        assert!(matches!(
            FixPlan::parse("The build is broken, sorry."),
            Err(FixPlanError::NoJson(_))
        ));
    }

    #[test]
    fn test_wrong_shape_is_json_error() {
        assert!(matches!(
            FixPlan::parse(r#"{"fixes": "none"}"#),
            Err(FixPlanError::Json(_))
        ));
    }

    #[test]
    fn test_confidence_is_clamped() {
        let plan = FixPlan::parse(r#"{"confidence": 7}"#).expect("parse");
        assert_eq!(plan.confidence, 1.0);
    }

    #[test]
    fn test_file_fix_serializes_with_action_tag() {
        let fix = FileFix {
            file: "a.kt".to_string(),
            action: FixAction::Add {
                content: "x".to_string(),
            },
            description: "new".to_string(),
        };
        let value = serde_json::to_value(&fix).expect("serialize");
        assert_eq!(value["action"], "add");
        assert_eq!(value["content"], "x");
        assert_eq!(value["file"], "a.kt");
    }
}
