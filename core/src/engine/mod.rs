//! # Script function engine
//!
//! One `Engine` is one session: it owns the template registry, the call stack, the
//! scoped var store, the delayed-call queue, the internal loop slot and the
//! diagnostic log. Hosts drive it through the methods here and in `execute`,
//! `running` and `queries`.
//!
//! ## Re-entrancy
//!
//! Function bodies live in the host. The engine pushes a frame, then hands itself
//! to [`Host::raise_event`]; the host's handlers call back into the same engine to
//! read params, set return values, call further functions or abort.
//!
//! ## Errors
//!
//! Every public operation that can fail returns [`ScriptError`] and also records it
//! in the diagnostic log, so hosts that ignore the `Result` can still read it from
//! [`Engine::last_error`].

pub mod call_stack;
pub mod delayed;
pub mod diagnostics;
pub mod errors;
pub mod execute;
pub mod host;
pub mod internal_loop;
pub mod queries;
pub mod registry;
pub mod running;
pub mod scoped_vars;
pub mod types;

#[cfg(test)]
mod tests;

pub use delayed::{DelayUnit, DelayedFunction};
pub use errors::{ErrorKind, Result, ScriptError};
pub use execute::DelaySchedule;
pub use host::{with_saved_selection, Host, HostEvent};
pub use internal_loop::{LoopItem, LoopKind};
pub use types::{Expected, FrameState, FunctionTemplate, Param, RunningFunction, ScopedVar, Value, ValueType};

use tracing::debug;

use crate::config::EngineConfig;
use call_stack::CallStack;
use delayed::DelayedQueue;
use diagnostics::DiagnosticLog;
use internal_loop::LoopSlot;
use registry::TemplateRegistry;
use scoped_vars::ScopedVarStore;

#[derive(Debug, Default)]
pub struct Engine {
    config: EngineConfig,
    templates: TemplateRegistry,
    stack: CallStack,
    scoped: ScopedVarStore,
    delayed: DelayedQueue,
    loop_slot: LoopSlot,
    diagnostics: DiagnosticLog,
    last_return: Value,
    last_abort_reason: String,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn templates(&self) -> impl Iterator<Item = &FunctionTemplate> {
        self.templates.iter()
    }

    pub fn template(&self, name: &str) -> Option<&FunctionTemplate> {
        self.templates.get(name)
    }

    pub fn call_stack(&self) -> &[RunningFunction] {
        self.stack.frames()
    }

    pub fn delayed_functions(&self) -> impl Iterator<Item = &DelayedFunction> {
        self.delayed.iter()
    }

    /// Record a failed result in the diagnostic log and pass it through.
    fn reported<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            self.diagnostics.record_error(err);
        }
        result
    }

    /// Template name for a name-or-blank argument; blank means the template of
    /// the function currently running.
    fn resolve_template_name(&self, op: &'static str, name_or_blank: &str) -> Result<String> {
        if name_or_blank.is_empty() {
            return Ok(self.stack.require(op, "")?.template.clone());
        }
        Ok(self.templates.require(op, name_or_blank)?.name.clone())
    }

    /* ===================== Declaration ===================== */

    /// Declare or re-declare a function template from its signature.
    pub fn declare(
        &mut self,
        signature: &str,
        delaying: Expected,
        repeating: Expected,
        recursion_allowed: bool,
    ) -> Result<()> {
        let max_params = self.config.max_params();
        let result = self
            .templates
            .declare(signature, delaying, repeating, recursion_allowed, max_params)
            .map(|_| ());
        self.reported(result)
    }

    /// Declare with the host's integer policy flags (0 never, 1 optional, 2 always).
    pub fn declare_with_flags(
        &mut self,
        signature: &str,
        delaying: i32,
        repeating: i32,
        recursion_allowed: i32,
    ) -> Result<()> {
        let result = flag_policy("delaying expected", delaying).and_then(|d| {
            let r = flag_policy("repeating expected", repeating)?;
            let recursive = match recursion_allowed {
                0 => false,
                1 => true,
                value => {
                    return Err(ScriptError::InvalidFlag {
                        op: "declare",
                        what: "recursion allowed",
                        allowed: "0 or 1",
                        value,
                    })
                }
            };
            Ok((d, r, recursive))
        });
        let (delaying, repeating, recursive) = self.reported(result)?;
        self.declare(signature, delaying, repeating, recursive)
    }

    /* ===================== Template Setters ===================== */

    /// Set the value a function returns when nothing else is returned; `Value::Unset`
    /// clears it.
    pub fn set_default_return(&mut self, name_or_blank: &str, value: Value) -> Result<()> {
        const OP: &str = "set default return";
        let result = self
            .resolve_template_name(OP, name_or_blank)
            .and_then(|name| self.templates.set_default_return(OP, &name, value));
        self.reported(result)
    }

    pub fn set_param_default(
        &mut self,
        name_or_blank: &str,
        param_name: &str,
        value: Value,
        treat_as_any: bool,
    ) -> Result<()> {
        const OP: &str = "set param default";
        let result = self.resolve_template_name(OP, name_or_blank).and_then(|name| {
            self.templates
                .set_param_default(OP, &name, param_name, value, treat_as_any)
        });
        self.reported(result)
    }

    pub fn set_scoped_var_on_start(
        &mut self,
        name_or_blank: &str,
        var_name: &str,
        value: Value,
        recursive_override: bool,
    ) -> Result<()> {
        const OP: &str = "set scoped var on start";
        let result = self.resolve_template_name(OP, name_or_blank).and_then(|name| {
            self.templates
                .set_scoped_var_on_start(OP, &name, var_name, value, recursive_override)
        });
        self.reported(result)
    }

    pub fn cancel_scoped_var_on_start(&mut self, name_or_blank: &str, var_name: &str) -> Result<()> {
        const OP: &str = "cancel scoped var on start";
        let result = self
            .resolve_template_name(OP, name_or_blank)
            .and_then(|name| self.templates.cancel_scoped_var_on_start(OP, &name, var_name));
        self.reported(result)
    }

    pub fn set_enabled(&mut self, name_or_blank: &str, enabled: bool) -> Result<()> {
        const OP: &str = "set enabled";
        let result = self
            .resolve_template_name(OP, name_or_blank)
            .and_then(|name| self.templates.set_enabled(OP, &name, enabled));
        self.reported(result)
    }

    /// Redirect calls of one function to another.
    pub fn set_redirect(&mut self, name_or_blank: &str, target: &str) -> Result<()> {
        const OP: &str = "set redirect";
        let result = self
            .resolve_template_name(OP, name_or_blank)
            .and_then(|name| self.templates.set_redirect(OP, &name, target));
        self.reported(result)
    }

    /// Tag a function with the host object it runs on; blank clears it.
    pub fn set_owner(&mut self, name_or_blank: &str, owner: &str) -> Result<()> {
        const OP: &str = "set owner";
        let result = self
            .resolve_template_name(OP, name_or_blank)
            .and_then(|name| self.templates.set_owner(OP, &name, Some(owner.to_string())));
        self.reported(result)
    }

    /* ===================== Delayed Queue ===================== */

    /// Drop queued delayed calls whose function name starts with `prefix`; blank
    /// clears the queue. Returns how many were removed.
    pub fn cancel_delayed_by_prefix(&mut self, prefix: &str) -> usize {
        let removed = self.delayed.cancel_by_prefix(prefix);
        debug!(prefix, removed, "cancelled delayed functions");
        removed
    }

    /// The host moved to a new frame; drop delayed calls that don't survive it.
    pub fn frame_changed(&mut self) -> usize {
        let removed = self.delayed.frame_changed();
        debug!(removed, "frame changed");
        removed
    }
}

fn flag_policy(what: &'static str, flag: i32) -> Result<Expected> {
    Expected::from_flag(flag).ok_or(ScriptError::InvalidFlag {
        op: "declare",
        what,
        allowed: "0, 1 or 2",
        value: flag,
    })
}
