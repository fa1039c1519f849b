//! TOML-described host
//!
//! A small host application for the `funcscript` binary and for integration
//! tests. Each function is declared from a `[[function]]` table and its body is a
//! list of one-line commands run whenever the engine raises the function:
//!
//! ```toml
//! [[function]]
//! signature = "Integer Add(Integer x, Integer y = 0)"
//! body = ["set sum $x", "add sum $y", "return $sum"]
//! ```
//!
//! Commands:
//!
//! - `return <value>`
//! - `call <expression>`
//! - `delay <ticks> <repeats> <every> <expression>`
//! - `abort <reason> [target]`
//! - `set <scoped var> <value>` / `add <scoped var> <value>`
//! - `print <text>`
//! - `loop templates|delayed|params|vars <loop name>`, with the loop body in a
//!   `[[loop]]` table of the same name
//! - `stop`
//!
//! `$name` reads a loop variable (`$loop_index`, `$loop_name`, `$loop_type`,
//! `$loop_value`), a parameter of the running function, or a scoped var.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::rc::Rc;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::engine::{DelaySchedule, DelayUnit, Engine, Host, HostEvent, Value, ValueType};
use crate::parser;

/* ===================== File Format ===================== */

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostFile {
    #[serde(default, rename = "function")]
    pub functions: Vec<FunctionDef>,
    #[serde(default, rename = "loop")]
    pub loops: Vec<LoopDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub signature: String,
    /// 0 never, 1 optional, 2 always.
    #[serde(default = "optional_flag")]
    pub delaying: i32,
    #[serde(default = "optional_flag")]
    pub repeating: i32,
    #[serde(default)]
    pub recursion: bool,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    /// Literal text, typed by its shape.
    #[serde(default)]
    pub default_return: Option<String>,
    #[serde(default)]
    pub redirect: Option<String>,
    /// Scoped vars created whenever the function starts, as literal text.
    #[serde(default)]
    pub scoped_on_start: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopDef {
    pub name: String,
    #[serde(default)]
    pub body: Vec<String>,
}

fn optional_flag() -> i32 {
    1
}

fn enabled_default() -> bool {
    true
}

/* ===================== Commands ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopTarget {
    Templates,
    Delayed,
    Params,
    ScopedVars,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Return(String),
    Call(String),
    Delay {
        ticks: i32,
        repeats: i32,
        every: i32,
        script: String,
    },
    Abort {
        reason: String,
        target: String,
    },
    Set {
        var: String,
        value: String,
    },
    Add {
        var: String,
        amount: String,
    },
    Print(String),
    Loop {
        target: LoopTarget,
        name: String,
    },
    Stop,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "return" => Command::Return(required(word, rest)?.to_string()),
            "call" => Command::Call(required(word, rest)?.to_string()),
            "delay" => {
                let mut parts = rest.splitn(4, char::is_whitespace);
                let mut number = |what: &str| -> Result<i32> {
                    let text = parts.next().unwrap_or_default();
                    text.parse::<i32>()
                        .with_context(|| format!("delay: {} \"{}\" is not an integer", what, text))
                };
                let ticks = number("ticks")?;
                let repeats = number("repeats")?;
                let every = number("every")?;
                let script = parts.next().unwrap_or_default().trim();
                Command::Delay {
                    ticks,
                    repeats,
                    every,
                    script: required(word, script)?.to_string(),
                }
            }
            "abort" => {
                let (reason, target) = match rest.split_once(char::is_whitespace) {
                    Some((reason, target)) => (reason, target.trim()),
                    None => (rest, ""),
                };
                Command::Abort {
                    reason: required(word, reason)?.to_string(),
                    target: target.to_string(),
                }
            }
            "set" | "add" => {
                let (var, value) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| anyhow!("{}: expected a scoped var name and a value", word))?;
                let (var, value) = (var.to_string(), value.trim().to_string());
                if word.eq_ignore_ascii_case("set") {
                    Command::Set { var, value }
                } else {
                    Command::Add { var, amount: value }
                }
            }
            "print" => Command::Print(rest.to_string()),
            "loop" => {
                let (kind, name) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| anyhow!("loop: expected a loop kind and a loop name"))?;
                let target = match kind.to_ascii_lowercase().as_str() {
                    "templates" => LoopTarget::Templates,
                    "delayed" => LoopTarget::Delayed,
                    "params" => LoopTarget::Params,
                    "vars" => LoopTarget::ScopedVars,
                    other => bail!("loop: unknown loop kind \"{}\"", other),
                };
                Command::Loop {
                    target,
                    name: name.trim().to_string(),
                }
            }
            "stop" => Command::Stop,
            "" => bail!("empty command"),
            other => bail!("unknown command \"{}\"", other),
        };
        Ok(command)
    }
}

fn required<'a>(command: &str, text: &'a str) -> Result<&'a str> {
    if text.is_empty() {
        bail!("{}: missing argument", command);
    }
    Ok(text)
}

fn compile(lines: &[String], owner: &str) -> Result<Rc<[Command]>> {
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| Command::parse(line).with_context(|| format!("{} body, line {}", owner, i + 1)))
        .collect::<Result<Vec<_>>>()
        .map(Rc::from)
}

/* ===================== Host ===================== */

#[derive(Debug, Default)]
pub struct ScriptHost {
    file: HostFile,
    functions: HashMap<String, Rc<[Command]>>,
    loops: HashMap<String, Rc<[Command]>>,
    /// Lines written by `print`.
    pub output: Vec<String>,
    /// Host object the running body acts on.
    pub selected: Option<String>,
    bodies: Vec<String>,
    loop_vars: Vec<HashMap<&'static str, Value>>,
}

impl ScriptHost {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read host file {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("Invalid host file {}", path.display()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: HostFile = toml::from_str(text)?;
        Self::from_file(file)
    }

    pub fn from_file(file: HostFile) -> Result<Self> {
        let mut host = Self::default();
        for def in &file.functions {
            let name = parser::parse_signature(&def.signature)
                .map(|sig| sig.name)
                .map_err(|e| anyhow!("signature \"{}\": {}", def.signature, e))?;
            host.functions
                .insert(name.to_ascii_lowercase(), compile(&def.body, &name)?);
        }
        for def in &file.loops {
            host.loops
                .insert(def.name.to_ascii_lowercase(), compile(&def.body, &def.name)?);
        }
        host.file = file;
        Ok(host)
    }

    pub fn file(&self) -> &HostFile {
        &self.file
    }

    /// Declare every function in the file and apply its settings.
    pub fn declare_all(&self, engine: &mut Engine) -> Result<()> {
        for def in &self.file.functions {
            engine
                .declare_with_flags(&def.signature, def.delaying, def.repeating, i32::from(def.recursion))
                .with_context(|| format!("Failed to declare \"{}\"", def.signature))?;
        }

        for def in &self.file.functions {
            let name = parser::parse_signature(&def.signature)?.name;
            if let Some(owner) = &def.owner {
                engine.set_owner(&name, owner)?;
            }
            if let Some(text) = &def.default_return {
                engine.set_default_return(&name, literal(text))?;
            }
            for (var, text) in &def.scoped_on_start {
                engine.set_scoped_var_on_start(&name, var, literal(text), false)?;
            }
            if let Some(target) = &def.redirect {
                engine
                    .set_redirect(&name, target)
                    .with_context(|| format!("Failed to redirect \"{}\"", name))?;
            }
            if !def.enabled {
                engine.set_enabled(&name, false)?;
            }
        }
        info!(functions = self.file.functions.len(), "declared host functions");
        Ok(())
    }

    fn run_body(&mut self, engine: &mut Engine, body: &[Command]) {
        for command in body {
            if !self.run_command(engine, command) {
                break;
            }
            let aborted = engine.call_stack().last().is_some_and(|f| !f.is_active());
            if aborted {
                break;
            }
        }
    }

    /// Run one command; `false` ends the body early. Engine failures are already
    /// in its diagnostic log and don't end the body.
    fn run_command(&mut self, engine: &mut Engine, command: &Command) -> bool {
        debug!(?command, "host command");
        match command {
            Command::Return(token) => {
                let value = self.resolve(engine, token);
                engine.set_return_value(value).ok();
            }
            Command::Call(script) => {
                let script = self.substitute(engine, script, true);
                engine.run_script(self, &script).ok();
            }
            Command::Delay {
                ticks,
                repeats,
                every,
                script,
            } => {
                let script = self.substitute(engine, script, true);
                let schedule = DelaySchedule {
                    first_delay: *ticks,
                    repeat_count: *repeats,
                    subsequent_delay: *every,
                    crosses_frames: false,
                    unit: DelayUnit::Ticks,
                };
                engine.enqueue_delayed_script(&*self, &script, schedule).ok();
            }
            Command::Abort { reason, target } => {
                engine.abort(reason, target).ok();
                return false;
            }
            Command::Set { var, value } => {
                let value = self.resolve(engine, value);
                engine.set_scoped_var(var, value, true).ok();
            }
            Command::Add { var, amount } => {
                let amount = self.resolve(engine, amount);
                let current = engine.scoped_var(var);
                let sum = match current {
                    Value::Integer(i) => Value::Integer(i.wrapping_add(amount.as_integer())),
                    Value::Float(f) => Value::Float(f + amount.as_float()),
                    Value::String(s) => Value::String(s + &amount.as_string()),
                    Value::Unset => amount,
                };
                engine.set_scoped_var(var, sum, true).ok();
            }
            Command::Print(text) => {
                let line = self.substitute(engine, text, false);
                info!(target: "funcscript::print", "{}", line);
                self.output.push(line);
            }
            Command::Loop { target, name } => {
                let result = match target {
                    LoopTarget::Templates => engine.loop_templates(self, name),
                    LoopTarget::Delayed => engine.loop_delayed(self, name),
                    LoopTarget::Params => engine.loop_params(self, name, true),
                    LoopTarget::ScopedVars => engine.loop_scoped_vars(self, name, true),
                };
                result.ok();
            }
            Command::Stop => {
                engine.stop_function(true, true, true).ok();
                return false;
            }
        }
        true
    }

    /// Value of a `$name` reference or a literal.
    fn resolve(&self, engine: &mut Engine, token: &str) -> Value {
        match token.strip_prefix('$') {
            Some(name) => self.lookup(engine, name),
            None => literal(token),
        }
    }

    fn lookup(&self, engine: &mut Engine, name: &str) -> Value {
        if let Some(value) = self.loop_vars.last().and_then(|vars| vars.get(name)) {
            return value.clone();
        }
        let param = engine.call_stack().last().and_then(|frame| {
            let template = engine.template(&frame.template)?;
            let index = template.param_index(name)?;
            frame.param_values.get(index).cloned()
        });
        match param {
            Some(value) => value,
            None => engine.scoped_var(name),
        }
    }

    /// Replace each `$name` in `text`. Call scripts get literal syntax so the
    /// substituted value parses back to the same type.
    fn substitute(&self, engine: &mut Engine, text: &str, as_literal: bool) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find('$') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            if end == 0 {
                out.push('$');
                rest = after;
                continue;
            }
            let value = self.lookup(engine, &after[..end]);
            out.push_str(&if as_literal { literal_text(&value) } else { value.as_string() });
            rest = &after[end..];
        }
        out.push_str(rest);
        out
    }

    fn loop_scope(engine: &mut Engine, event: &HostEvent) -> HashMap<&'static str, Value> {
        let mut vars = HashMap::new();
        let index = i32::try_from(engine.loop_index()).unwrap_or(i32::MAX);
        vars.insert("loop_index", Value::Integer(index));
        match event {
            HostEvent::TemplateLoop { .. } => {
                vars.insert("loop_name", Value::String(engine.loop_template_name()));
            }
            HostEvent::DelayedLoop { .. } => {
                if let Some(entry) = engine.loop_delayed_entry() {
                    vars.insert("loop_name", Value::String(entry.template));
                }
            }
            HostEvent::ParamLoop { .. } | HostEvent::ScopedVarLoop { .. } => {
                vars.insert("loop_name", Value::String(engine.loop_var_name()));
                vars.insert("loop_type", Value::String(engine.loop_var_type()));
                vars.insert("loop_value", engine.loop_var_value());
            }
            HostEvent::Function { .. } => {}
        }
        vars
    }
}

impl Host for ScriptHost {
    type Selection = Option<String>;

    fn raise_event(&mut self, engine: &mut Engine, event: HostEvent) {
        match &event {
            HostEvent::Function { name, owner } => {
                let Some(body) = self.functions.get(&name.to_ascii_lowercase()).cloned() else {
                    debug!(function = %name, "no body for function");
                    return;
                };
                if owner.is_some() {
                    self.selected = owner.clone();
                }
                self.bodies.push(name.clone());
                self.run_body(engine, &body);
                self.bodies.pop();
            }
            HostEvent::TemplateLoop { loop_name }
            | HostEvent::DelayedLoop { loop_name }
            | HostEvent::ParamLoop { loop_name }
            | HostEvent::ScopedVarLoop { loop_name } => {
                let Some(body) = self.loops.get(&loop_name.to_ascii_lowercase()).cloned() else {
                    debug!(loop_name = %loop_name, "no body for loop");
                    return;
                };
                let vars = Self::loop_scope(engine, &event);
                self.loop_vars.push(vars);
                self.run_body(engine, &body);
                self.loop_vars.pop();
            }
        }
    }

    fn save_selection(&mut self) -> Option<String> {
        self.selected.clone()
    }

    fn restore_selection(&mut self, saved: Option<String>, _reselect: bool) {
        self.selected = saved;
    }

    fn call_site_label(&self) -> String {
        match self.bodies.last() {
            Some(name) => format!("{} body", name),
            None => "command line".to_string(),
        }
    }
}

/// Literal text typed by its shape; unparseable text is kept as a string.
fn literal(text: &str) -> Value {
    parser::parse_literal(text, ValueType::Any).unwrap_or_else(|| Value::String(text.to_string()))
}

/// Text that `parse_literal` reads back as the same value.
fn literal_text(value: &Value) -> String {
    match value {
        Value::Unset => String::new(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => format!("{:?}", f),
        Value::String(_) => value.annotated(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use maplit::btreemap;

    fn setup(toml: &str) -> (Engine, ScriptHost) {
        let host = ScriptHost::from_toml_str(toml).unwrap();
        let mut engine = Engine::new(EngineConfig::default());
        host.declare_all(&mut engine).unwrap();
        (engine, host)
    }

    #[test]
    fn test_command_parsing() {
        assert_eq!(
            Command::parse("delay 5 2 10 Spawn(\"orc\", 3)").unwrap(),
            Command::Delay {
                ticks: 5,
                repeats: 2,
                every: 10,
                script: "Spawn(\"orc\", 3)".into(),
            }
        );
        assert_eq!(
            Command::parse("abort bad_state Outer").unwrap(),
            Command::Abort {
                reason: "bad_state".into(),
                target: "Outer".into(),
            }
        );
        assert_eq!(
            Command::parse("LOOP vars each").unwrap(),
            Command::Loop {
                target: LoopTarget::ScopedVars,
                name: "each".into(),
            }
        );
        assert!(Command::parse("jump 3").is_err());
        assert!(Command::parse("delay x 0 0 F()").is_err());
        assert!(Command::parse("return").is_err());
    }

    #[test]
    fn test_bad_body_line_names_function() {
        let err = ScriptHost::from_toml_str(
            r#"
            [[function]]
            signature = "Any F()"
            body = ["print ok", "explode"]
            "#,
        )
        .unwrap_err();
        assert_eq!(format!("{:#}", err), "F body, line 2: unknown command \"explode\"");
    }

    #[test]
    fn test_add_function() {
        let (mut engine, mut host) = setup(
            r#"
            [[function]]
            signature = "Integer Add(Integer x, Integer y = 0)"
            body = ["set sum $x", "add sum $y", "return $sum"]
            "#,
        );

        let value = engine.run_script(&mut host, "Add(5, 2)").unwrap();
        assert_eq!(value, Value::Integer(7));
        assert_eq!(engine.run_script(&mut host, "Add(4)").unwrap(), Value::Integer(4));
        assert_eq!(engine.current_log(false), "");
    }

    #[test]
    fn test_nested_calls_and_prints() {
        let (mut engine, mut host) = setup(
            r#"
            [[function]]
            signature = "String Greet(String who)"
            owner = "npc"
            body = ["print hello $who from $who_site", "return $who"]

            [[function]]
            signature = "Any Outer()"
            body = ["set who_site outer", "call Greet(\"Ann Lee\")", "print back"]
            "#,
        );

        engine.run_script(&mut host, "Outer()").unwrap();

        assert_eq!(host.output, vec!["hello Ann Lee from outer", "back"]);
        assert_eq!(engine.last_return(), &Value::Unset);
        assert_eq!(host.selected, None);
    }

    #[test]
    fn test_abort_ends_body_and_unwinds() {
        let (mut engine, mut host) = setup(
            r#"
            [[function]]
            signature = "Any Outer()"
            body = ["call Inner()", "print after inner"]

            [[function]]
            signature = "Any Inner()"
            body = ["abort no_target Outer", "print unreachable"]
            "#,
        );

        engine.run_script(&mut host, "Outer()").unwrap();

        assert!(host.output.is_empty());
        assert_eq!(engine.abort_reason(), "no_target");
    }

    #[test]
    fn test_delayed_calls_from_body() {
        let (mut engine, mut host) = setup(
            r#"
            [[function]]
            signature = "Any Start()"
            body = ["delay 2 1 1 Tick(\"x\")"]

            [[function]]
            signature = "Any Tick(String tag)"
            body = ["print tick $tag"]
            "#,
        );

        engine.run_script(&mut host, "Start()").unwrap();
        assert_eq!(engine.delayed_functions().count(), 1);
        assert_eq!(engine.delayed_functions().next().unwrap().call_site, "Start body");

        engine.advance_ticks(&mut host, 1);
        engine.advance_ticks(&mut host, 1);
        engine.advance_ticks(&mut host, 1);

        assert_eq!(host.output, vec!["tick x", "tick x"]);
        assert_eq!(engine.delayed_functions().count(), 0);
    }

    #[test]
    fn test_param_loop_body() {
        let (mut engine, mut host) = setup(
            r#"
            [[function]]
            signature = "Any Show(Integer n, Float f = 0.5)"
            body = ["loop params each"]

            [[loop]]
            name = "each"
            body = ["print $loop_index $loop_name $loop_type $loop_value"]
            "#,
        );

        engine.run_script(&mut host, "Show(3)").unwrap();

        assert_eq!(host.output, vec!["0 n Integer 3", "1 f Float 0.5"]);
    }

    #[test]
    fn test_settings_applied_on_declare() {
        let file = HostFile {
            functions: vec![
                FunctionDef {
                    signature: "Any Old()".into(),
                    delaying: 0,
                    repeating: 2,
                    recursion: false,
                    owner: Some("door".into()),
                    enabled: false,
                    default_return: Some("\"closed\"".into()),
                    redirect: None,
                    scoped_on_start: btreemap! { "hp".to_string() => "10".to_string() },
                    body: vec![],
                },
                FunctionDef {
                    signature: "Any Alias()".into(),
                    delaying: 1,
                    repeating: 1,
                    recursion: true,
                    owner: None,
                    enabled: true,
                    default_return: None,
                    redirect: Some("Old".into()),
                    scoped_on_start: BTreeMap::new(),
                    body: vec![],
                },
            ],
            loops: vec![],
        };
        let host = ScriptHost::from_file(file).unwrap();
        let mut engine = Engine::new(EngineConfig::default());
        host.declare_all(&mut engine).unwrap();

        let old = engine.template("old").unwrap();
        assert_eq!(old.owner.as_deref(), Some("door"));
        assert!(!old.enabled);
        assert_eq!(old.default_return, Value::from("closed"));
        assert_eq!(old.scoped_var_defaults[0].value, Value::Integer(10));
        assert_eq!(engine.template_repeating("Old"), 2);
        assert_eq!(engine.template_redirect("Alias"), "Old");
    }

    #[test]
    fn test_declare_failure_is_reported() {
        let host = ScriptHost::from_toml_str(
            r#"
            [[function]]
            signature = "Any F(Integer a = 1, Integer b)"
            "#,
        )
        .unwrap();
        let mut engine = Engine::new(EngineConfig::default());

        let err = host.declare_all(&mut engine).unwrap_err();

        assert!(format!("{:#}", err).starts_with("Failed to declare \"Any F(Integer a = 1, Integer b)\": declare:"));
    }
}
