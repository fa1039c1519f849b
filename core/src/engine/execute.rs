//! Call dispatch
//!
//! Resolves a call to its final template, binds the arguments, pushes a frame and
//! raises the function's body through the host once per repeat (or per foreach
//! selector) before popping it again.

use std::time::Duration;

use tracing::debug;

use super::delayed::{DelayUnit, DelayedFunction};
use super::errors::{Result, ScriptError};
use super::host::{with_saved_selection, Host, HostEvent};
use super::internal_loop::{LoopItem, LoopKind};
use super::types::{Expected, FunctionTemplate, RunningFunction, Value};
use super::Engine;
use crate::parser;

/// When and how often a delayed call runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelaySchedule {
    pub first_delay: i32,
    /// Runs after the first one.
    pub repeat_count: i32,
    pub subsequent_delay: i32,
    pub crosses_frames: bool,
    pub unit: DelayUnit,
}

impl DelaySchedule {
    pub fn once(delay: i32, unit: DelayUnit) -> Self {
        Self {
            first_delay: delay,
            repeat_count: 0,
            subsequent_delay: 0,
            crosses_frames: false,
            unit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallMode {
    Immediate,
    Repeating(i32),
    Delayed,
}

struct CallRequest {
    op: &'static str,
    name: String,
    args: Vec<Value>,
    mode: CallMode,
    foreach: Option<Vec<i32>>,
    call_site: Option<String>,
}

impl CallRequest {
    fn new(op: &'static str, name: &str, args: Vec<Value>, mode: CallMode) -> Self {
        Self {
            op,
            name: name.to_string(),
            args,
            mode,
            foreach: None,
            call_site: None,
        }
    }
}

impl Engine {
    /* ===================== Calls ===================== */

    /// Parse and run a call expression such as `Add(5, int 2)`.
    pub fn run_script<H: Host>(&mut self, host: &mut H, script: &str) -> Result<Value> {
        const OP: &str = "run script";
        let parsed = self.parse_script_call(OP, script);
        let (name, args) = self.reported(parsed)?;
        self.dispatch(host, CallRequest::new(OP, &name, args, CallMode::Immediate))
    }

    /// Run a function once with positional arguments; `Value::Unset` arguments
    /// take the parameter's default.
    pub fn call_function<H: Host>(&mut self, host: &mut H, name: &str, args: Vec<Value>) -> Result<Value> {
        self.dispatch(host, CallRequest::new("call function", name, args, CallMode::Immediate))
    }

    /// Run a function `repeat_count` times in one frame.
    pub fn call_repeating<H: Host>(
        &mut self,
        host: &mut H,
        name: &str,
        args: Vec<Value>,
        repeat_count: i32,
    ) -> Result<Value> {
        const OP: &str = "call repeating";
        if repeat_count < 1 {
            let err = ScriptError::InvalidRepeatSetting {
                op: OP,
                detail: format!("repeat count of {}; must be 1 or more", repeat_count),
            };
            return self.reported(Err(err));
        }
        self.dispatch(host, CallRequest::new(OP, name, args, CallMode::Repeating(repeat_count)))
    }

    /// Run a function once per host object selector, in one frame.
    pub fn run_foreach<H: Host>(
        &mut self,
        host: &mut H,
        name: &str,
        args: Vec<Value>,
        selectors: &[i32],
    ) -> Result<Value> {
        let mut request = CallRequest::new("run foreach", name, args, CallMode::Immediate);
        request.foreach = Some(selectors.to_vec());
        self.dispatch(host, request)
    }

    fn dispatch<H: Host>(&mut self, host: &mut H, request: CallRequest) -> Result<Value> {
        let result = self.dispatch_inner(host, request);
        self.reported(result)
    }

    fn dispatch_inner<H: Host>(&mut self, host: &mut H, request: CallRequest) -> Result<Value> {
        let op = request.op;
        let template = self.resolve_call_template(op, &request.name, request.args.len())?;
        check_call_policy(&template, request.mode)?;

        if !template.enabled {
            self.last_return = template.default_return.clone();
            if template.default_return.is_unset() {
                return Err(ScriptError::DisabledWithoutDefault {
                    function: template.name.clone(),
                });
            }
            debug!(function = %template.name, "disabled function returned its default");
            return Ok(template.default_return.clone());
        }

        if !template.recursion_allowed && self.stack.has_active(&template.name) {
            return Err(ScriptError::RecursionNotAllowed {
                function: template.name.clone(),
            });
        }

        let (param_values, num_passed) = bind_args(op, &template, &request.args)?;
        let mut frame = RunningFunction::new(template.name.clone(), param_values, num_passed);
        if let CallMode::Repeating(count) = request.mode {
            frame.repeat_count = count;
        }
        frame.delayed = request.mode == CallMode::Delayed;
        frame.call_site = request.call_site.unwrap_or_else(|| host.call_site_label());

        let recursing = self.stack.contains(&template.name);
        let depth = self.stack.push(frame);
        for spec in &template.scoped_var_defaults {
            if recursing && !spec.recursive_override {
                continue;
            }
            self.scoped.push_spec(spec, depth);
        }

        let index = depth - 1;
        let event = HostEvent::Function {
            name: template.name.clone(),
            owner: template.owner.clone(),
        };
        match request.foreach {
            Some(selectors) => self.run_foreach_iterations(host, index, &event, &selectors),
            None => self.run_iterations(host, index, &event),
        }

        let frame = self
            .stack
            .pop()
            .ok_or(ScriptError::NoRunningFunction { op })?;
        self.last_abort_reason = frame
            .abort_reason()
            .map(str::to_string)
            .unwrap_or_default();
        let value = if frame.return_value.is_unset() {
            self.templates
                .get(&frame.template)
                .map(|t| t.default_return.clone())
                .unwrap_or_default()
        } else {
            frame.return_value.clone()
        };
        self.last_return = value.clone();

        debug!(function = %frame.template, returned = ?value, "function finished");
        Ok(value)
    }

    fn run_iterations<H: Host>(&mut self, host: &mut H, index: usize, event: &HostEvent) {
        loop {
            let Some(frame) = self.stack.frame_mut(index) else {
                return;
            };
            if !frame.is_active() || !frame.continue_next_iterations || frame.repeat_index >= frame.repeat_count {
                return;
            }
            frame.continue_current_iteration = true;
            debug!(function = %frame.template, repeat = frame.repeat_index, "raising function body");

            let event = event.clone();
            with_saved_selection(host, true, |host| host.raise_event(self, event));

            if let Some(frame) = self.stack.frame_mut(index) {
                frame.repeat_index += 1;
            }
        }
    }

    fn run_foreach_iterations<H: Host>(
        &mut self,
        host: &mut H,
        index: usize,
        event: &HostEvent,
        selectors: &[i32],
    ) {
        for &selector in selectors {
            let Some(frame) = self.stack.frame_mut(index) else {
                return;
            };
            if !frame.is_active() || !frame.continue_foreach {
                return;
            }
            frame.foreach_selector = Some(selector);
            frame.repeat_index = 0;
            frame.continue_next_iterations = true;
            self.run_iterations(host, index, event);
        }
    }

    /// Template that a call of `name` actually runs, synthesizing one for an
    /// undeclared name when templates are optional.
    fn resolve_call_template(&mut self, op: &'static str, name: &str, arg_count: usize) -> Result<FunctionTemplate> {
        if name.trim().is_empty() {
            return Err(ScriptError::BlankName {
                op,
                what: "function name",
            });
        }
        if self.templates.get(name).is_none() {
            if !self.config.templates_optional {
                return Err(ScriptError::TemplateRequired {
                    op,
                    name: name.to_string(),
                });
            }
            if parser::is_reserved_name(name) {
                return Err(ScriptError::ReservedName {
                    op,
                    name: name.to_string(),
                });
            }
            debug!(function = name, params = arg_count, "synthesized function template");
            self.templates.insert(FunctionTemplate::synthesized(name, arg_count));
        }
        Ok(self.templates.resolve_redirects(op, name)?.clone())
    }

    /// Name and argument values of a call expression, typed against the template
    /// of the named function.
    fn parse_script_call(&mut self, op: &'static str, script: &str) -> Result<(String, Vec<Value>)> {
        let ast = parser::parse_call(script).map_err(|_| ScriptError::UnparseableCall {
            op,
            script: script.to_string(),
        })?;
        if parser::is_reserved_name(&ast.name) {
            return Err(ScriptError::ReservedName { op, name: ast.name });
        }

        // Argument text is typed by the called name's own template, before redirects.
        self.resolve_call_template(op, &ast.name, ast.args.len())?;
        let template = self.templates.require(op, &ast.name)?;
        if ast.args.len() > template.params.len() {
            return Err(ScriptError::TooManyArgs {
                op,
                function: template.name.clone(),
                supplied: ast.args.len(),
                max: template.params.len(),
            });
        }

        let mut values = Vec::with_capacity(ast.args.len());
        for (index, (arg, param)) in ast.args.iter().zip(&template.params).enumerate() {
            let target = match arg.type_hint {
                Some(hint) if param.declared_type.accepts(hint) => hint,
                Some(hint) => {
                    return Err(ScriptError::TypeMismatch {
                        op,
                        name: param.name.clone(),
                        expected: param.declared_type,
                        offered: hint,
                    })
                }
                None => param.declared_type,
            };
            let value = parser::parse_literal(&arg.text, target).ok_or_else(|| ScriptError::InvalidLiteral {
                op,
                param: param.name.clone(),
                index,
                text: arg.text.clone(),
                expected: target,
            })?;
            values.push(value);
        }
        Ok((template.name.clone(), values))
    }

    /* ===================== Delayed Calls ===================== */

    /// Queue a call to run later. Arguments are checked now.
    pub fn enqueue_delayed<H: Host>(
        &mut self,
        host: &H,
        name: &str,
        args: Vec<Value>,
        schedule: DelaySchedule,
    ) -> Result<()> {
        let result = self.queue_delayed("enqueue delayed", name, args, schedule, host.call_site_label());
        self.reported(result)
    }

    /// Queue a call expression to run later.
    pub fn enqueue_delayed_script<H: Host>(&mut self, host: &H, script: &str, schedule: DelaySchedule) -> Result<()> {
        const OP: &str = "enqueue delayed script";
        let result = self
            .parse_script_call(OP, script)
            .and_then(|(name, args)| self.queue_delayed(OP, &name, args, schedule, host.call_site_label()));
        self.reported(result)
    }

    fn queue_delayed(
        &mut self,
        op: &'static str,
        name: &str,
        args: Vec<Value>,
        schedule: DelaySchedule,
        call_site: String,
    ) -> Result<()> {
        for (what, value) in [
            ("first delay", schedule.first_delay),
            ("repeat count", schedule.repeat_count),
            ("subsequent delay", schedule.subsequent_delay),
        ] {
            if value < 0 {
                return Err(ScriptError::NegativeAmount { op, what, value });
            }
        }

        let template = self.resolve_call_template(op, name, args.len())?;
        check_call_policy(&template, CallMode::Delayed)?;
        bind_args(op, &template, &args)?;

        let called = self.templates.require(op, name)?.name.clone();
        self.delayed.enqueue(DelayedFunction {
            template: called,
            num_passed_params: args.len(),
            args,
            first_delay: schedule.first_delay,
            repeat_count: schedule.repeat_count,
            subsequent_delay: schedule.subsequent_delay,
            crosses_frames: schedule.crosses_frames,
            unit: schedule.unit,
            call_site,
            remaining: 0,
            runs: 0,
        });
        Ok(())
    }

    /// Count tick-based delayed calls down and run those now due.
    /// Returns how many ran.
    pub fn advance_ticks<H: Host>(&mut self, host: &mut H, ticks: i64) -> usize {
        self.pump_delayed(host, DelayUnit::Ticks, ticks)
    }

    /// Count millisecond-based delayed calls down and run those now due.
    pub fn advance_time<H: Host>(&mut self, host: &mut H, elapsed: Duration) -> usize {
        let millis = i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX);
        self.pump_delayed(host, DelayUnit::Milliseconds, millis)
    }

    fn pump_delayed<H: Host>(&mut self, host: &mut H, unit: DelayUnit, amount: i64) -> usize {
        if amount < 0 {
            return 0;
        }
        let due = self.delayed.advance(unit, amount);
        let count = due.len();
        for entry in due {
            debug!(function = %entry.template, run = entry.runs, "running delayed function");
            let mut request = CallRequest::new("delayed call", &entry.template, entry.args, CallMode::Delayed);
            request.call_site = Some(entry.call_site);
            // Failures are already in the diagnostic log.
            self.dispatch(host, request).ok();
        }
        count
    }

    /* ===================== Internal Loops ===================== */

    /// Raise one `TemplateLoop` event per declared template.
    pub fn loop_templates<H: Host>(&mut self, host: &mut H, loop_name: &str) -> Result<()> {
        let event = HostEvent::TemplateLoop {
            loop_name: loop_name.to_string(),
        };
        self.run_internal_loop(host, "template loop", loop_name, LoopKind::Templates, event, |engine| {
            Ok(engine
                .templates
                .iter()
                .map(|t| LoopItem::Template { name: t.name.clone() })
                .collect())
        })
    }

    /// Raise one `DelayedLoop` event per queued delayed call.
    pub fn loop_delayed<H: Host>(&mut self, host: &mut H, loop_name: &str) -> Result<()> {
        let event = HostEvent::DelayedLoop {
            loop_name: loop_name.to_string(),
        };
        self.run_internal_loop(host, "delayed function loop", loop_name, LoopKind::DelayedFunctions, event, |engine| {
            Ok(engine.delayed.iter().cloned().map(LoopItem::Delayed).collect())
        })
    }

    /// Raise one `ParamLoop` event per parameter of the running function.
    pub fn loop_params<H: Host>(&mut self, host: &mut H, loop_name: &str, include_non_passed: bool) -> Result<()> {
        const OP: &str = "param loop";
        let event = HostEvent::ParamLoop {
            loop_name: loop_name.to_string(),
        };
        self.run_internal_loop(host, OP, loop_name, LoopKind::Params, event, |engine| {
            let frame = engine.stack.require(OP, "")?;
            let template = engine.templates.require(OP, &frame.template)?;
            let count = if include_non_passed {
                frame.param_values.len()
            } else {
                frame.num_passed_params
            };
            Ok(template
                .params
                .iter()
                .zip(&frame.param_values)
                .take(count)
                .map(|(param, value)| LoopItem::Param {
                    name: param.name.clone(),
                    declared_type: param.declared_type,
                    value: value.clone(),
                })
                .collect())
        })
    }

    /// Raise one `ScopedVarLoop` event per scoped var visible to the running function.
    pub fn loop_scoped_vars<H: Host>(&mut self, host: &mut H, loop_name: &str, include_inherited: bool) -> Result<()> {
        const OP: &str = "scoped var loop";
        let event = HostEvent::ScopedVarLoop {
            loop_name: loop_name.to_string(),
        };
        self.run_internal_loop(host, OP, loop_name, LoopKind::ScopedVars, event, |engine| {
            engine.stack.require(OP, "")?;
            Ok(engine
                .scoped
                .visible(engine.stack.depth(), include_inherited)
                .into_iter()
                .map(|var| LoopItem::ScopedVar {
                    name: var.name.clone(),
                    declared_type: var.declared_type,
                    value: var.value.clone(),
                })
                .collect())
        })
    }

    fn run_internal_loop<H, F>(
        &mut self,
        host: &mut H,
        op: &'static str,
        loop_name: &str,
        kind: LoopKind,
        event: HostEvent,
        items: F,
    ) -> Result<()>
    where
        H: Host,
        F: FnOnce(&Engine) -> Result<Vec<LoopItem>>,
    {
        let acquired = self.loop_slot.try_acquire(op, loop_name, kind);
        self.reported(acquired)?;

        let items = match items(&*self) {
            Ok(items) => items,
            Err(err) => {
                self.loop_slot.release();
                return self.reported(Err(err));
            }
        };
        for (index, item) in items.into_iter().enumerate() {
            self.loop_slot.advance(index, item);
            let event = event.clone();
            with_saved_selection(host, true, |host| host.raise_event(self, event));
        }
        self.loop_slot.release();
        Ok(())
    }
}

fn check_call_policy(template: &FunctionTemplate, mode: CallMode) -> Result<()> {
    let function = || template.name.clone();
    match (template.delaying, mode) {
        (Expected::Always, CallMode::Immediate | CallMode::Repeating(_)) => {
            return Err(ScriptError::DelayRequired { function: function() })
        }
        (Expected::Never, CallMode::Delayed) => return Err(ScriptError::DelayNotAllowed { function: function() }),
        _ => {}
    }
    match (template.repeating, mode) {
        (Expected::Always, CallMode::Immediate) => Err(ScriptError::RepeatRequired { function: function() }),
        (Expected::Never, CallMode::Repeating(_)) => Err(ScriptError::RepeatNotAllowed { function: function() }),
        _ => Ok(()),
    }
}

/// Positional values for every parameter, plus how many were supplied.
fn bind_args(op: &'static str, template: &FunctionTemplate, args: &[Value]) -> Result<(Vec<Value>, usize)> {
    if args.len() > template.params.len() {
        return Err(ScriptError::TooManyArgs {
            op,
            function: template.name.clone(),
            supplied: args.len(),
            max: template.params.len(),
        });
    }

    let mut values = Vec::with_capacity(template.params.len());
    for (index, param) in template.params.iter().enumerate() {
        match args.get(index) {
            Some(arg) if !arg.is_unset() => values.push(arg.coerce_to(param.declared_type)),
            _ if !param.is_required() => values.push(param.default.clone()),
            _ => {
                return Err(ScriptError::MissingArgument {
                    op,
                    function: template.name.clone(),
                    param: param.name.clone(),
                    index,
                })
            }
        }
    }
    Ok((values, args.len()))
}
