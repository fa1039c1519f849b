//! Operations a running function performs on itself
//!
//! All of these act on the top frame of the call stack and are meant to be called
//! from inside a host event handler.

use tracing::debug;

use super::errors::{Result, ScriptError};
use super::types::{Value, ValueType};
use super::Engine;

impl Engine {
    /// Set the running function's return value.
    ///
    /// The value's type must match the declared return type unless that is `Any`.
    pub fn set_return_value(&mut self, value: Value) -> Result<()> {
        let result = self.set_return_value_inner(value);
        self.reported(result)
    }

    fn set_return_value_inner(&mut self, value: Value) -> Result<()> {
        const OP: &str = "set return value";
        let frame = self.stack.require(OP, "")?;
        let template = self.templates.require(OP, &frame.template)?;
        let offered = value.value_type();
        if !value.is_unset() && !template.return_type.accepts(offered) {
            return Err(ScriptError::ReturnTypeMismatch {
                function: template.name.clone(),
                expected: template.return_type,
                offered,
            });
        }
        self.stack.require_mut(OP, "")?.return_value = value;
        Ok(())
    }

    /// Overwrite one of the running function's parameters.
    pub fn set_param(&mut self, param_name: &str, value: Value) -> Result<()> {
        let result = self.set_param_inner(param_name, value);
        self.reported(result)
    }

    fn set_param_inner(&mut self, param_name: &str, value: Value) -> Result<()> {
        const OP: &str = "set param";
        let frame = self.stack.require(OP, "")?;
        let template = self.templates.require(OP, &frame.template)?;
        let index = template
            .param_index(param_name)
            .ok_or_else(|| ScriptError::ParamNotFound {
                op: OP,
                function: template.name.clone(),
                param: param_name.to_string(),
            })?;
        let param = &template.params[index];
        let offered = value.value_type();
        if !value.is_unset() && !param.declared_type.accepts(offered) {
            return Err(ScriptError::TypeMismatch {
                op: OP,
                name: param.name.clone(),
                expected: param.declared_type,
                offered,
            });
        }
        let frame = self.stack.require_mut(OP, "")?;
        if let Some(slot) = frame.param_values.get_mut(index) {
            *slot = value;
        }
        Ok(())
    }

    /// Set a scoped var visible at the current depth, creating it there if it
    /// doesn't exist and `create_if_absent` is set.
    pub fn set_scoped_var(&mut self, name: &str, value: Value, create_if_absent: bool) -> Result<()> {
        let depth = self.stack.depth();
        let result = self.scoped.set("set scoped var", name, value, depth, create_if_absent);
        self.reported(result)
    }

    /// Clear continuation flags of the running function.
    pub fn stop_function(&mut self, cancel_current: bool, cancel_next: bool, cancel_foreach: bool) -> Result<()> {
        let result = if !(cancel_current || cancel_next || cancel_foreach) {
            Err(ScriptError::NothingToStop)
        } else {
            self.stack.require_mut("stop function", "").map(|frame| {
                if cancel_current {
                    frame.continue_current_iteration = false;
                }
                if cancel_next {
                    frame.continue_next_iterations = false;
                }
                if cancel_foreach {
                    frame.continue_foreach = false;
                }
            })
        };
        self.reported(result)
    }

    /// Move the running function to another repeat position.
    ///
    /// Re-arms a cancelled repeat sequence unless `ignore_existing_cancel` is set.
    pub fn change_repeat_setting(
        &mut self,
        new_index: i32,
        new_count: i32,
        ignore_existing_cancel: bool,
    ) -> Result<()> {
        const OP: &str = "change repeat setting";
        let invalid = |detail: String| Err(ScriptError::InvalidRepeatSetting { op: OP, detail });

        let result = if new_index < 0 {
            invalid(format!("new repeat index of {}; must be 0 or more", new_index))
        } else if new_count < 1 {
            invalid(format!("new repeat count of {}; must be 1 or more", new_count))
        } else if new_index >= new_count {
            invalid(format!(
                "new repeat index of {} is not below new repeat count {}",
                new_index, new_count
            ))
        } else {
            self.stack.require_mut(OP, "").map(|frame| {
                if !frame.is_active() {
                    return;
                }
                frame.repeat_index = new_index;
                frame.repeat_count = new_count;
                if !ignore_existing_cancel {
                    frame.continue_next_iterations = true;
                }
            })
        };
        self.reported(result)
    }

    /// Abort the running function, unwinding to `unwind_target` (blank: only the
    /// running function).
    ///
    /// Every unwound frame gets the reason and stops iterating. A frame without a
    /// return value falls back to its default return; if it has none a warning is
    /// logged.
    pub fn abort(&mut self, reason: &str, unwind_target: &str) -> Result<()> {
        let result = self.abort_inner(reason, unwind_target);
        self.reported(result)
    }

    fn abort_inner(&mut self, reason: &str, unwind_target: &str) -> Result<()> {
        if reason.is_empty() {
            return Err(ScriptError::EmptyAbortReason);
        }
        let current = self.stack.require("abort", "")?;
        if !current.is_active() {
            return Err(ScriptError::AlreadyAborted {
                reason: reason.to_string(),
            });
        }
        let aborting = current.template.clone();

        let unwound = if unwind_target.is_empty() {
            self.stack.unwind_to(reason, |_| true)
        } else {
            self.stack.unwind_to(reason, |f| f.is_named(unwind_target))
        }
        .ok_or_else(|| ScriptError::UnwindTargetNotFound {
            function: aborting.clone(),
            target: unwind_target.to_string(),
        })?;

        let mut warnings = Vec::new();
        for frame in unwound.iter_mut() {
            if !frame.return_value.is_unset() {
                continue;
            }
            let default = self
                .templates
                .get(&frame.template)
                .map(|t| t.default_return.clone())
                .unwrap_or_default();
            if default.is_unset() {
                warnings.push(format!(
                    "function \"{}\" aborted by \"{}\" with no return value and no default return value; called from {}",
                    frame.template, aborting, frame.call_site
                ));
            } else {
                frame.return_value = default;
            }
        }
        debug!(function = %aborting, target = unwind_target, reason, "aborted");
        for warning in warnings {
            self.diagnostics.record_warning(warning);
        }
        Ok(())
    }
}
