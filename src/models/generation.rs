//! Rule generation requests, their status, and assembled prompts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RecordId;

/// One generation: the prompt that was submitted and, once the backend has
/// heard back from the LLM, the rule body it produced.
///
/// Created incomplete; flips to complete exactly once via
/// [`GenerationResult::apply_status`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub id: RecordId,
    pub workspace: RecordId,
    pub prompt: String,
    #[serde(default, rename = "prompt_modules")]
    pub module_ids: Vec<RecordId>,
    #[serde(default)]
    pub base_prompt_id: Option<RecordId>,
    #[serde(default)]
    pub is_complete: bool,
    #[serde(default)]
    pub rule: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl GenerationResult {
    /// Patch completion state from a status response.
    ///
    /// Returns true when this call moved the result to complete. Statuses
    /// for other ids, incomplete statuses and repeats are ignored.
    pub fn apply_status(&mut self, status: &GenerationStatus) -> bool {
        if self.is_complete || status.id != self.id || !status.is_complete {
            return false;
        }
        self.is_complete = true;
        self.rule = status.rule.clone();
        true
    }
}

/// Response of `GET /api/rule-generations/<id>/status/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationStatus {
    pub id: RecordId,
    pub is_complete: bool,
    #[serde(default)]
    pub rule: Option<String>,
}

/// Prompt text assembled by the backend from base, modules and samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembledPrompt {
    pub prompt: String,
    #[serde(default)]
    pub metadata: PromptMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptMetadata {
    #[serde(default)]
    pub base_prompt: Option<TemplateSummary>,
    #[serde(default)]
    pub modules: Vec<TemplateSummary>,
    #[serde(default)]
    pub email_sample_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSummary {
    pub id: Option<RecordId>,
    pub name: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub module_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(id: RecordId) -> GenerationResult {
        GenerationResult {
            id,
            workspace: 1,
            prompt: "prompt".into(),
            module_ids: vec![],
            base_prompt_id: None,
            is_complete: false,
            rule: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_apply_status_completes_once() {
        let mut result = pending(5);
        let done = GenerationStatus {
            id: 5,
            is_complete: true,
            rule: Some("score SPAM_TEST 1.0".into()),
        };
        assert!(result.apply_status(&done));
        assert!(result.is_complete);
        assert_eq!(result.rule.as_deref(), Some("score SPAM_TEST 1.0"));

        let again = GenerationStatus {
            id: 5,
            is_complete: true,
            rule: Some("something else".into()),
        };
        assert!(!result.apply_status(&again));
        assert_eq!(result.rule.as_deref(), Some("score SPAM_TEST 1.0"));
    }

    #[test]
    fn test_apply_status_ignores_other_ids_and_pending() {
        let mut result = pending(5);
        let other = GenerationStatus {
            id: 6,
            is_complete: true,
            rule: Some("x".into()),
        };
        let still_running = GenerationStatus {
            id: 5,
            is_complete: false,
            rule: None,
        };
        assert!(!result.apply_status(&other));
        assert!(!result.apply_status(&still_running));
        assert!(!result.is_complete);
    }

    #[test]
    fn test_assembled_prompt_metadata() {
        let json = r#"{
            "prompt": "Write rules",
            "metadata": {
                "base_prompt": {"id": 1, "name": "Default"},
                "modules": [{"id": 4, "name": "Scoring", "type": "scoring"}],
                "email_sample_count": 2
            }
        }"#;
        let assembled: AssembledPrompt = serde_json::from_str(json).unwrap();
        assert_eq!(assembled.metadata.modules[0].module_type.as_deref(), Some("scoring"));
        assert_eq!(assembled.metadata.email_sample_count, 2);
    }
}
