//! Running-function frame types

use super::values::Value;
use serde::{Deserialize, Serialize};

/// Lifecycle of one activation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum FrameState {
    Pending,
    Active,
    Completed,
    Aborted { reason: String },
}

/// One in-progress activation of a template.
///
/// `template` is the resolved (post-redirect) template name; `params` holds one
/// value per template parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunningFunction {
    pub template: String,
    pub param_values: Vec<Value>,
    pub num_passed_params: usize,
    pub return_value: Value,
    pub repeat_index: i32,
    pub repeat_count: i32,
    pub foreach_selector: Option<i32>,
    pub state: FrameState,
    pub continue_current_iteration: bool,
    pub continue_next_iterations: bool,
    pub continue_foreach: bool,
    pub call_site: String,
    /// Call started from the delayed queue.
    pub delayed: bool,
}

impl RunningFunction {
    pub fn new(template: impl Into<String>, param_values: Vec<Value>, num_passed_params: usize) -> Self {
        Self {
            template: template.into(),
            param_values,
            num_passed_params,
            return_value: Value::Unset,
            repeat_index: 0,
            repeat_count: 1,
            foreach_selector: None,
            state: FrameState::Pending,
            continue_current_iteration: true,
            continue_next_iterations: true,
            continue_foreach: true,
            call_site: String::new(),
            delayed: false,
        }
    }

    /// Pending or running, i.e. not yet aborted or completed.
    pub fn is_active(&self) -> bool {
        matches!(self.state, FrameState::Pending | FrameState::Active)
    }

    pub fn abort_reason(&self) -> Option<&str> {
        match &self.state {
            FrameState::Aborted { reason } => Some(reason),
            _ => None,
        }
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.template.eq_ignore_ascii_case(name)
    }
}
