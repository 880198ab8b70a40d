//! Wizard steps and the gate between them

use serde::{Deserialize, Serialize};
use std::fmt;

/// The four wizard steps, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Upload,
    Headers,
    Prompt,
    Rule,
}

impl Step {
    pub const ALL: [Step; 4] = [Step::Upload, Step::Headers, Step::Prompt, Step::Rule];

    /// 1-based position for display ("Step 2 of 4")
    pub fn number(&self) -> usize {
        match self {
            Step::Upload => 1,
            Step::Headers => 2,
            Step::Prompt => 3,
            Step::Rule => 4,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Step::Upload => "Upload Email Samples",
            Step::Headers => "Select Headers",
            Step::Prompt => "Configure Prompt",
            Step::Rule => "Generate Rule",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title())
    }
}

/// Snapshot of what has been completed so far, used to gate the steps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub samples: usize,
    pub available_headers: usize,
    pub selected_headers: usize,
    /// A prompt was assembled during this session
    pub prompt_generated: bool,
    /// Results already stored for the workspace
    pub prior_results: usize,
    pub read_only: bool,
}

/// Tracks the active step and decides which steps are reachable.
///
/// Navigation never touches the network; it only compares the requested
/// step against a [`Progress`] snapshot.
#[derive(Debug, Clone)]
pub struct StepController {
    current: Step,
    read_only: bool,
}

impl StepController {
    /// Read-only workspaces start (and stay) at [`Step::Rule`]
    pub fn new(read_only: bool) -> Self {
        Self {
            current: if read_only { Step::Rule } else { Step::Upload },
            read_only,
        }
    }

    pub fn current(&self) -> Step {
        self.current
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn can_access(&self, step: Step, progress: &Progress) -> bool {
        if self.read_only || progress.read_only {
            return step == Step::Rule;
        }
        match step {
            Step::Upload => true,
            Step::Headers => progress.samples > 0,
            Step::Prompt => progress.selected_headers > 0 && progress.available_headers > 0,
            Step::Rule => progress.prompt_generated || progress.prior_results > 0,
        }
    }

    /// Move to `step` if it is reachable. Returns whether the step changed;
    /// requesting the current step changes nothing.
    pub fn go_to(&mut self, step: Step, progress: &Progress) -> bool {
        if step == self.current || !self.can_access(step, progress) {
            return false;
        }
        tracing::debug!("Wizard step {} -> {}", self.current, step);
        self.current = step;
        true
    }

    /// Steps the user may currently jump to
    pub fn reachable(&self, progress: &Progress) -> Vec<Step> {
        Step::ALL
            .into_iter()
            .filter(|step| self.can_access(*step, progress))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gates_follow_progress() {
        let controller = StepController::new(false);
        let mut progress = Progress::default();
        assert_eq!(controller.reachable(&progress), vec![Step::Upload]);

        progress.samples = 1;
        assert!(controller.can_access(Step::Headers, &progress));
        assert!(!controller.can_access(Step::Prompt, &progress));

        progress.available_headers = 5;
        progress.selected_headers = 2;
        assert!(controller.can_access(Step::Prompt, &progress));
        assert!(!controller.can_access(Step::Rule, &progress));

        progress.prompt_generated = true;
        assert!(controller.can_access(Step::Rule, &progress));
    }

    #[test]
    fn test_rule_reachable_with_prior_results() {
        let controller = StepController::new(false);
        let progress = Progress {
            prior_results: 1,
            ..Default::default()
        };
        assert!(controller.can_access(Step::Rule, &progress));
        assert!(!controller.can_access(Step::Headers, &progress));
    }

    #[test]
    fn test_selection_without_headers_blocks_prompt() {
        let controller = StepController::new(false);
        let progress = Progress {
            samples: 1,
            selected_headers: 1,
            ..Default::default()
        };
        assert!(!controller.can_access(Step::Prompt, &progress));
    }

    #[test]
    fn test_go_to_current_is_noop() {
        let mut controller = StepController::new(false);
        assert!(!controller.go_to(Step::Upload, &Progress::default()));
        assert_eq!(controller.current(), Step::Upload);
    }

    #[test]
    fn test_go_to_unreachable_is_noop() {
        let mut controller = StepController::new(false);
        assert!(!controller.go_to(Step::Rule, &Progress::default()));
        assert_eq!(controller.current(), Step::Upload);
    }

    #[test]
    fn test_read_only_pins_rule_step() {
        let mut controller = StepController::new(true);
        assert_eq!(controller.current(), Step::Rule);
        let progress = Progress {
            samples: 3,
            available_headers: 3,
            selected_headers: 3,
            prompt_generated: true,
            prior_results: 2,
            read_only: true,
        };
        assert_eq!(controller.reachable(&progress), vec![Step::Rule]);
        assert!(!controller.go_to(Step::Upload, &progress));
        assert_eq!(controller.current(), Step::Rule);
    }
}
