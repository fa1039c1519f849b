//! Running-function call stack
//!
//! Frames are pushed when a call is dispatched and popped once its repeat/foreach
//! sequence finishes, strictly LIFO.

use tracing::debug;

use super::errors::{Result, ScriptError};
use super::types::{FrameState, RunningFunction};

#[derive(Debug, Default, Clone)]
pub struct CallStack {
    frames: Vec<RunningFunction>,
}

impl CallStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[RunningFunction] {
        &self.frames
    }

    pub fn frame_mut(&mut self, index: usize) -> Option<&mut RunningFunction> {
        self.frames.get_mut(index)
    }

    pub fn top(&self) -> Option<&RunningFunction> {
        self.frames.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut RunningFunction> {
        self.frames.last_mut()
    }

    /// Push a frame and mark it active. Returns the new depth.
    pub fn push(&mut self, mut frame: RunningFunction) -> usize {
        frame.state = FrameState::Active;
        debug!(function = %frame.template, depth = self.frames.len() + 1, "push frame");
        self.frames.push(frame);
        self.frames.len()
    }

    /// Pop the top frame, completing it unless it was aborted.
    pub fn pop(&mut self) -> Option<RunningFunction> {
        let mut frame = self.frames.pop()?;
        if frame.is_active() {
            frame.state = FrameState::Completed;
        }
        debug!(function = %frame.template, depth = self.frames.len(), "pop frame");
        Some(frame)
    }

    /// Frame by template name, searching from the top; blank means the top frame.
    pub fn find(&self, name_or_blank: &str) -> Option<&RunningFunction> {
        if name_or_blank.is_empty() {
            return self.top();
        }
        self.frames.iter().rev().find(|f| f.is_named(name_or_blank))
    }

    pub fn find_mut(&mut self, name_or_blank: &str) -> Option<&mut RunningFunction> {
        if name_or_blank.is_empty() {
            return self.top_mut();
        }
        self.frames.iter_mut().rev().find(|f| f.is_named(name_or_blank))
    }

    /// Resolve a running frame for `op`, failing if nothing (or nothing by that name) runs.
    pub fn require(&self, op: &'static str, name_or_blank: &str) -> Result<&RunningFunction> {
        if self.frames.is_empty() {
            return Err(ScriptError::NoRunningFunction { op });
        }
        self.find(name_or_blank).ok_or_else(|| ScriptError::FunctionNotRunning {
            op,
            name: name_or_blank.to_string(),
        })
    }

    pub fn require_mut(&mut self, op: &'static str, name_or_blank: &str) -> Result<&mut RunningFunction> {
        if self.frames.is_empty() {
            return Err(ScriptError::NoRunningFunction { op });
        }
        self.find_mut(name_or_blank).ok_or_else(|| ScriptError::FunctionNotRunning {
            op,
            name: name_or_blank.to_string(),
        })
    }

    /// Whether the template has a frame on the stack that has not been aborted.
    pub fn has_active(&self, template: &str) -> bool {
        self.frames.iter().any(|f| f.is_named(template) && f.is_active())
    }

    pub fn contains(&self, template: &str) -> bool {
        self.frames.iter().any(|f| f.is_named(template))
    }

    /// Abort every frame from the top down to and including the nearest frame
    /// matching `target`.
    ///
    /// Returns the unwound frames (bottom-most first), or `None` without touching
    /// the stack if no frame matches.
    pub fn unwind_to<F>(&mut self, reason: &str, target: F) -> Option<&mut [RunningFunction]>
    where
        F: Fn(&RunningFunction) -> bool,
    {
        let index = self.frames.iter().rposition(|f| target(f))?;
        let unwound = &mut self.frames[index..];
        for frame in unwound.iter_mut() {
            frame.state = FrameState::Aborted {
                reason: reason.to_string(),
            };
            frame.continue_current_iteration = false;
            frame.continue_next_iterations = false;
        }
        debug!(frames = unwound.len(), reason, "unwound call stack");
        Some(unwound)
    }

    /// `"<name> called from <call site>"` per frame, newest first unless
    /// `most_recent_at_bottom`. `rewind_count` of -1 lists every frame.
    pub fn format(&self, most_recent_at_bottom: bool, rewind_count: i32) -> Result<String> {
        if self.frames.is_empty() {
            return Err(ScriptError::EmptyCallStack);
        }
        if rewind_count == 0 || rewind_count < -1 {
            return Err(ScriptError::InvalidRewindCount { count: rewind_count });
        }
        let take = if rewind_count == -1 {
            self.frames.len()
        } else {
            rewind_count as usize
        };

        let line = |f: &RunningFunction| format!("{} called from {}", f.template, f.call_site);
        let lines: Vec<String> = if most_recent_at_bottom {
            self.frames.iter().take(take).map(line).collect()
        } else {
            self.frames.iter().rev().take(take).map(line).collect()
        };
        Ok(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(name: &str) -> RunningFunction {
        let mut f = RunningFunction::new(name, Vec::new(), 0);
        f.call_site = format!("event {}", name);
        f
    }

    fn stack(names: &[&str]) -> CallStack {
        let mut stack = CallStack::new();
        for name in names {
            stack.push(frame(name));
        }
        stack
    }

    #[test]
    fn test_push_pop_states() {
        let mut stack = stack(&["A"]);
        assert_eq!(stack.top().unwrap().state, FrameState::Active);
        let popped = stack.pop().unwrap();
        assert_eq!(popped.state, FrameState::Completed);
        assert!(stack.pop().is_none());
    }

    #[test]
    fn test_find_searches_from_top() {
        let mut stack = stack(&["A", "B", "A"]);
        stack.top_mut().unwrap().repeat_index = 7;
        assert_eq!(stack.find("a").unwrap().repeat_index, 7);
        assert_eq!(stack.find("").unwrap().template, "A");
        assert!(stack.find("C").is_none());
        assert!(matches!(
            stack.require("op", "C"),
            Err(ScriptError::FunctionNotRunning { .. })
        ));
        assert!(matches!(
            CallStack::new().require("op", ""),
            Err(ScriptError::NoRunningFunction { .. })
        ));
    }

    #[test]
    fn test_unwind_to_named_target() {
        let mut stack = stack(&["Root", "A", "B", "C"]);
        let unwound = stack.unwind_to("bad state", |f| f.is_named("a")).unwrap();
        assert_eq!(unwound.len(), 3);

        let frames = stack.frames();
        assert!(frames[0].is_active());
        for f in &frames[1..] {
            assert!(!f.is_active());
            assert_eq!(f.abort_reason(), Some("bad state"));
            assert!(!f.continue_next_iterations);
            assert!(!f.continue_current_iteration);
        }
    }

    #[test]
    fn test_unwind_to_missing_target_is_noop() {
        let mut stack = stack(&["A", "B"]);
        assert!(stack.unwind_to("x", |f| f.is_named("Z")).is_none());
        assert!(stack.frames().iter().all(|f| f.is_active()));
    }

    #[test]
    fn test_format_call_stack() {
        let stack = stack(&["A", "B", "C"]);
        assert_eq!(
            stack.format(false, -1).unwrap(),
            "C called from event C\nB called from event B\nA called from event A"
        );
        assert_eq!(stack.format(true, 2).unwrap(), "A called from event A\nB called from event B");
        assert_eq!(stack.format(false, 1).unwrap(), "C called from event C");
        assert_eq!(stack.format(false, 0), Err(ScriptError::InvalidRewindCount { count: 0 }));
        assert_eq!(stack.format(false, -2), Err(ScriptError::InvalidRewindCount { count: -2 }));
        assert_eq!(CallStack::new().format(false, -1), Err(ScriptError::EmptyCallStack));
    }
}
