//! Read-only query surface
//!
//! Queries never fail outright: on error they record the diagnostic and return a
//! neutral value (`-1` for counts and indexes, `0`/`0.0`/blank for values).

use super::delayed::DelayedFunction;
use super::errors::{Result, ScriptError};
use super::internal_loop::{LoopItem, LoopKind};
use super::types::{FunctionTemplate, Param, RunningFunction, Value};
use super::Engine;

impl Engine {
    fn query_frame<T>(&mut self, op: &'static str, name_or_blank: &str, fallback: T, f: impl FnOnce(&RunningFunction) -> T) -> T {
        let result = self.stack.require(op, name_or_blank).map(f);
        self.reported(result).unwrap_or(fallback)
    }

    fn query_template<T>(
        &mut self,
        op: &'static str,
        name_or_blank: &str,
        fallback: T,
        f: impl FnOnce(&FunctionTemplate) -> Result<T>,
    ) -> T {
        let result = self
            .resolve_template_name(op, name_or_blank)
            .and_then(|name| self.templates.require(op, &name).and_then(f));
        self.reported(result).unwrap_or(fallback)
    }

    /* ===================== Running Function ===================== */

    pub fn repeat_index(&mut self, name_or_blank: &str) -> i32 {
        self.query_frame("repeat index", name_or_blank, -1, |f| f.repeat_index)
    }

    /// Repeats left, counting the one in progress.
    pub fn repeats_left(&mut self, name_or_blank: &str) -> i32 {
        self.query_frame("repeats left", name_or_blank, -1, |f| f.repeat_count - f.repeat_index)
    }

    pub fn repeats_total(&mut self, name_or_blank: &str) -> i32 {
        self.query_frame("repeats total", name_or_blank, -1, |f| f.repeat_count)
    }

    /// Selector of the object a foreach run is on; `-1` outside a foreach run.
    pub fn foreach_selector(&mut self, name_or_blank: &str) -> i32 {
        self.query_frame("foreach selector", name_or_blank, -1, |f| f.foreach_selector.unwrap_or(-1))
    }

    pub fn num_params_passed(&mut self, name_or_blank: &str) -> i32 {
        self.query_frame("num params passed", name_or_blank, -1, |f| {
            i32::try_from(f.num_passed_params).unwrap_or(i32::MAX)
        })
    }

    /// Parameter of the running function by position.
    pub fn param_by_index(&mut self, index: i32) -> Value {
        const OP: &str = "param by index";
        let result = self.stack.require(OP, "").and_then(|frame| {
            usize::try_from(index)
                .ok()
                .and_then(|i| frame.param_values.get(i))
                .cloned()
                .ok_or_else(|| ScriptError::ParamIndexOutOfRange {
                    op: OP,
                    function: frame.template.clone(),
                    index,
                    count: frame.param_values.len(),
                })
        });
        self.reported(result).unwrap_or_default()
    }

    /// Parameter of a running function by name.
    pub fn param_by_name(&mut self, name_or_blank: &str, param_name: &str) -> Value {
        const OP: &str = "param by name";
        let result = self.stack.require(OP, name_or_blank).and_then(|frame| {
            self.templates
                .get(&frame.template)
                .and_then(|t| t.param_index(param_name))
                .and_then(|i| frame.param_values.get(i))
                .cloned()
                .ok_or_else(|| ScriptError::ParamNotFound {
                    op: OP,
                    function: frame.template.clone(),
                    param: param_name.to_string(),
                })
        });
        self.reported(result).unwrap_or_default()
    }

    /// Scoped var visible at the current depth; `Unset` (read as 0 or blank) if absent.
    pub fn scoped_var(&mut self, name: &str) -> Value {
        const OP: &str = "get scoped var";
        let depth = self.stack.depth();
        let result = self
            .scoped
            .get(name, depth)
            .map(|var| var.value.clone())
            .ok_or_else(|| ScriptError::ScopedVarNotFound {
                op: OP,
                name: name.to_string(),
            });
        self.reported(result).unwrap_or_default()
    }

    /// Parameter values joined by `separator`. Annotated output reads
    /// `name = 5`, `name = 1.5f`, `name = "quoted"`.
    pub fn all_params_text(&mut self, name_or_blank: &str, separator: &str, annotate: bool) -> String {
        const OP: &str = "all params as text";
        let result = self.stack.require(OP, name_or_blank).map(|frame| {
            let params: &[Param] = self
                .templates
                .get(&frame.template)
                .map(|t| t.params.as_slice())
                .unwrap_or_default();
            frame
                .param_values
                .iter()
                .enumerate()
                .map(|(i, value)| match (annotate, params.get(i)) {
                    (true, Some(param)) => format!("{} = {}", param.name, value.annotated()),
                    _ => value.as_string(),
                })
                .collect::<Vec<_>>()
                .join(separator)
        });
        self.reported(result).unwrap_or_default()
    }

    /// Call stack as `"<name> called from <site>"` lines. `rewind_count` of -1
    /// lists every frame, otherwise only the first that many lines.
    pub fn call_stack_text(&mut self, most_recent_at_bottom: bool, rewind_count: i32) -> String {
        let result = self.stack.format(most_recent_at_bottom, rewind_count);
        self.reported(result).unwrap_or_default()
    }

    /// Abort reason of the running function, or of the last function to finish
    /// when none is running.
    pub fn abort_reason(&self) -> String {
        match self.stack.top() {
            Some(frame) => frame.abort_reason().unwrap_or_default().to_string(),
            None => self.last_abort_reason.clone(),
        }
    }

    /* ===================== Diagnostics & Last Return ===================== */

    pub fn last_error(&self) -> &str {
        self.diagnostics.last_error()
    }

    /// Errors and warnings so far, newline-separated; optionally cleared.
    pub fn current_log(&mut self, clear: bool) -> String {
        self.diagnostics.current_log(clear)
    }

    pub fn last_return(&self) -> &Value {
        &self.last_return
    }

    /// Type of the last return value, or `"void"` if there was none.
    pub fn last_return_type(&self) -> &'static str {
        if self.last_return.is_unset() {
            "void"
        } else {
            self.last_return.type_name()
        }
    }

    /* ===================== Templates ===================== */

    pub fn template_name(&mut self, name_or_blank: &str) -> String {
        self.query_template("template name", name_or_blank, String::new(), |t| Ok(t.name.clone()))
    }

    pub fn template_required_params(&mut self, name_or_blank: &str) -> i32 {
        self.query_template("template required params", name_or_blank, -1, |t| {
            Ok(t.required_param_count() as i32)
        })
    }

    pub fn template_possible_params(&mut self, name_or_blank: &str) -> i32 {
        self.query_template("template possible params", name_or_blank, -1, |t| Ok(t.params.len() as i32))
    }

    pub fn template_return_type(&mut self, name_or_blank: &str) -> String {
        self.query_template("template return type", name_or_blank, String::new(), |t| {
            Ok(t.return_type.name().to_string())
        })
    }

    /// Repeat expectation as 0 (never), 1 (optional) or 2 (always).
    pub fn template_repeating(&mut self, name_or_blank: &str) -> i32 {
        self.query_template("template repeating", name_or_blank, -1, |t| Ok(t.repeating as i32))
    }

    /// Delay expectation as 0 (never), 1 (optional) or 2 (always).
    pub fn template_delaying(&mut self, name_or_blank: &str) -> i32 {
        self.query_template("template delaying", name_or_blank, -1, |t| Ok(t.delaying as i32))
    }

    pub fn template_recursion_allowed(&mut self, name_or_blank: &str) -> i32 {
        self.query_template("template recursion allowed", name_or_blank, -1, |t| {
            Ok(i32::from(t.recursion_allowed))
        })
    }

    pub fn template_enabled(&mut self, name_or_blank: &str) -> i32 {
        self.query_template("template enabled", name_or_blank, -1, |t| Ok(i32::from(t.enabled)))
    }

    pub fn template_redirect(&mut self, name_or_blank: &str) -> String {
        self.query_template("template redirect", name_or_blank, String::new(), |t| {
            Ok(t.redirect.clone().unwrap_or_default())
        })
    }

    pub fn template_owner(&mut self, name_or_blank: &str) -> String {
        self.query_template("template owner", name_or_blank, String::new(), |t| {
            Ok(t.owner.clone().unwrap_or_default())
        })
    }

    pub fn template_default_return(&mut self, name_or_blank: &str) -> Value {
        self.query_template("template default return", name_or_blank, Value::Unset, |t| {
            Ok(t.default_return.clone())
        })
    }

    pub fn template_param_name(&mut self, name_or_blank: &str, index: i32) -> String {
        const OP: &str = "template param name";
        self.query_template(OP, name_or_blank, String::new(), |t| {
            param_at(OP, t, index).map(|p| p.name.clone())
        })
    }

    pub fn template_param_type(&mut self, name_or_blank: &str, index: i32) -> String {
        const OP: &str = "template param type";
        self.query_template(OP, name_or_blank, String::new(), |t| {
            param_at(OP, t, index).map(|p| p.declared_type.name().to_string())
        })
    }

    pub fn template_param_default(&mut self, name_or_blank: &str, index: i32) -> Value {
        const OP: &str = "template param default";
        self.query_template(OP, name_or_blank, Value::Unset, |t| {
            param_at(OP, t, index).map(|p| p.default.clone())
        })
    }

    pub fn template_param_index(&mut self, name_or_blank: &str, param_name: &str) -> i32 {
        const OP: &str = "template param index";
        self.query_template(OP, name_or_blank, -1, |t| {
            param_named(OP, t, param_name)?;
            Ok(t.param_index(param_name).map_or(-1, |i| i as i32))
        })
    }

    pub fn template_param_type_by_name(&mut self, name_or_blank: &str, param_name: &str) -> String {
        const OP: &str = "template param type by name";
        self.query_template(OP, name_or_blank, String::new(), |t| {
            param_named(OP, t, param_name).map(|p| p.declared_type.name().to_string())
        })
    }

    pub fn template_param_default_by_name(&mut self, name_or_blank: &str, param_name: &str) -> Value {
        const OP: &str = "template param default by name";
        self.query_template(OP, name_or_blank, Value::Unset, |t| {
            param_named(OP, t, param_name).map(|p| p.default.clone())
        })
    }

    /* ===================== Internal Loop ===================== */

    /// Index of the current loop item; `-1` when no loop is open.
    pub fn loop_index(&mut self) -> i64 {
        let result = self.loop_slot.require("loop index").map(|c| c.index);
        self.reported(result).unwrap_or(-1)
    }

    /// Name of the current param or scoped var.
    pub fn loop_var_name(&mut self) -> String {
        let result = self
            .loop_slot
            .require_item("loop var name", &[LoopKind::Params, LoopKind::ScopedVars])
            .map(|item| match item {
                LoopItem::Param { name, .. } | LoopItem::ScopedVar { name, .. } => name.clone(),
                _ => String::new(),
            });
        self.reported(result).unwrap_or_default()
    }

    /// Declared type of the current param or scoped var.
    pub fn loop_var_type(&mut self) -> String {
        let result = self
            .loop_slot
            .require_item("loop var type", &[LoopKind::Params, LoopKind::ScopedVars])
            .map(|item| match item {
                LoopItem::Param { declared_type, .. } | LoopItem::ScopedVar { declared_type, .. } => {
                    declared_type.name().to_string()
                }
                _ => String::new(),
            });
        self.reported(result).unwrap_or_default()
    }

    /// Value of the current param or scoped var.
    pub fn loop_var_value(&mut self) -> Value {
        let result = self
            .loop_slot
            .require_item("loop var value", &[LoopKind::Params, LoopKind::ScopedVars])
            .map(|item| match item {
                LoopItem::Param { value, .. } | LoopItem::ScopedVar { value, .. } => value.clone(),
                _ => Value::Unset,
            });
        self.reported(result).unwrap_or_default()
    }

    /// Name of the current template in a template loop.
    pub fn loop_template_name(&mut self) -> String {
        let result = self
            .loop_slot
            .require_item("loop template name", &[LoopKind::Templates])
            .map(|item| match item {
                LoopItem::Template { name } => name.clone(),
                _ => String::new(),
            });
        self.reported(result).unwrap_or_default()
    }

    /// Current entry of a delayed-function loop.
    pub fn loop_delayed_entry(&mut self) -> Option<DelayedFunction> {
        let result = self
            .loop_slot
            .require_item("loop delayed entry", &[LoopKind::DelayedFunctions])
            .map(|item| match item {
                LoopItem::Delayed(entry) => Some(entry.clone()),
                _ => None,
            });
        self.reported(result).ok().flatten()
    }
}

fn param_at<'a>(op: &'static str, template: &'a FunctionTemplate, index: i32) -> Result<&'a Param> {
    usize::try_from(index)
        .ok()
        .and_then(|i| template.params.get(i))
        .ok_or_else(|| ScriptError::ParamIndexOutOfRange {
            op,
            function: template.name.clone(),
            index,
            count: template.params.len(),
        })
}

fn param_named<'a>(op: &'static str, template: &'a FunctionTemplate, name: &str) -> Result<&'a Param> {
    template.param(name).ok_or_else(|| ScriptError::ParamNotFound {
        op,
        function: template.name.clone(),
        param: name.to_string(),
    })
}
