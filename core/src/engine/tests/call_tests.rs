//! Dispatch, argument binding, repeats and call policies

use super::helpers::{declare, engine, ScriptedHost};
use crate::config::EngineConfig;
use crate::engine::{Engine, Expected, HostEvent, ScriptError, Value};

fn add_host() -> ScriptedHost {
    ScriptedHost::new().on("Add", |e, h| {
        let x = e.param_by_index(0).as_integer();
        let y = e.param_by_index(1).as_integer();
        let passed = e.num_params_passed("");
        h.log.push(format!("{} {} {}", x, y, passed));
        e.set_return_value(Value::Integer(x + y)).unwrap();
    })
}

#[test]
fn test_add_binds_trailing_default() {
    let mut engine = engine();
    declare(&mut engine, "Integer Add(Integer x, Integer y = 0)");
    let mut host = add_host();

    let result = engine.run_script(&mut host, "Add(5)");

    assert_eq!(result, Ok(Value::Integer(5)));
    assert_eq!(host.log, vec!["5 0 1"]);
    assert_eq!(engine.last_return(), &Value::Integer(5));
    assert_eq!(engine.last_return_type(), "Integer");
    assert!(engine.call_stack().is_empty());
}

#[test]
fn test_missing_required_argument_fails() {
    let mut engine = engine();
    declare(&mut engine, "Integer Add(Integer x, Integer y = 0)");
    let mut host = add_host();

    let result = engine.run_script(&mut host, "Add()");

    assert!(matches!(result, Err(ScriptError::MissingArgument { index: 0, .. })));
    assert!(host.events.is_empty());
    assert!(engine.last_error().contains("requires parameter \"x\""));
}

#[test]
fn test_call_function_by_value_is_case_insensitive() {
    let mut engine = engine();
    declare(&mut engine, "Integer Add(Integer x, Integer y = 0)");
    let mut host = add_host();

    let result = engine.call_function(&mut host, "add", vec![2.into(), 3.into()]);

    assert_eq!(result, Ok(Value::Integer(5)));
    assert_eq!(host.function_events(), vec!["Add"]);
    assert_eq!(host.log, vec!["2 3 2"]);
}

#[test]
fn test_unset_argument_takes_default() {
    let mut engine = engine();
    declare(&mut engine, "Integer Add(Integer x, Integer y = 4)");
    let mut host = add_host();

    let result = engine.call_function(&mut host, "Add", vec![1.into(), Value::Unset]);

    assert_eq!(result, Ok(Value::Integer(5)));
}

#[test]
fn test_too_many_script_arguments() {
    let mut engine = engine();
    declare(&mut engine, "Integer Add(Integer x, Integer y = 0)");
    let mut host = add_host();

    let result = engine.run_script(&mut host, "Add(1, 2, 3)");

    assert!(matches!(result, Err(ScriptError::TooManyArgs { supplied: 3, max: 2, .. })));
    assert!(host.events.is_empty());
}

#[test]
fn test_script_argument_typing() {
    let mut engine = engine();
    declare(&mut engine, "Any Show(Integer n, Any label = \"none\")");
    let mut host = ScriptedHost::new().on("Show", |e, h| {
        h.log.push(format!("{:?}", e.param_by_index(1)));
    });

    assert!(matches!(
        engine.run_script(&mut host, "Show(string \"x\")"),
        Err(ScriptError::TypeMismatch { .. })
    ));
    assert!(matches!(
        engine.run_script(&mut host, "Show(abc)"),
        Err(ScriptError::InvalidLiteral { .. })
    ));
    assert!(engine.run_script(&mut host, "Show(1, float 2)").is_ok());
    assert!(engine.run_script(&mut host, "Show(int 1)").is_ok());

    assert_eq!(host.log, vec!["Float(2.0)", "String(\"none\")"]);
}

#[test]
fn test_unparseable_and_reserved_scripts() {
    let mut engine = engine();
    let mut host = ScriptedHost::new();

    assert!(matches!(
        engine.run_script(&mut host, "not a call"),
        Err(ScriptError::UnparseableCall { .. })
    ));
    assert!(matches!(
        engine.run_script(&mut host, "KRFuncFS(1)"),
        Err(ScriptError::ReservedName { .. })
    ));
}

#[test]
fn test_undeclared_function_requires_template() {
    let mut engine = engine();
    let mut host = ScriptedHost::new();

    let result = engine.run_script(&mut host, "Nope(1)");

    assert!(matches!(result, Err(ScriptError::TemplateRequired { .. })));
    assert!(engine.template("Nope").is_none());
}

#[test]
fn test_templates_optional_synthesizes_untyped_params() {
    let mut engine = Engine::new(EngineConfig {
        templates_optional: true,
        ..EngineConfig::default()
    });
    let mut host = ScriptedHost::new().on("Greet", |e, h| {
        let a = e.param_by_name("", "a").as_string();
        let b = e.param_by_name("", "b").as_integer();
        h.log.push(format!("{} {}", a, b));
    });

    engine.run_script(&mut host, "Greet(\"hi\", 2)").unwrap();

    assert_eq!(host.log, vec!["hi 2"]);
    let template = engine.template("greet").unwrap();
    let names: Vec<_> = template.params.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
    assert_eq!(engine.last_return_type(), "void");
}

#[test]
fn test_repeating_call_runs_each_index() {
    let mut engine = engine();
    declare(&mut engine, "Any Tick()");
    let mut host = ScriptedHost::new().on("Tick", |e, h| {
        let line = format!("{}/{} left {}", e.repeat_index(""), e.repeats_total(""), e.repeats_left(""));
        h.log.push(line);
    });

    engine.call_repeating(&mut host, "Tick", vec![], 3).unwrap();

    assert_eq!(host.log, vec!["0/3 left 3", "1/3 left 2", "2/3 left 1"]);
}

#[test]
fn test_repeat_count_must_be_positive() {
    let mut engine = engine();
    declare(&mut engine, "Any Tick()");
    let mut host = ScriptedHost::new();

    assert!(matches!(
        engine.call_repeating(&mut host, "Tick", vec![], 0),
        Err(ScriptError::InvalidRepeatSetting { .. })
    ));
    assert!(host.events.is_empty());
}

#[test]
fn test_stop_next_iterations() {
    let mut engine = engine();
    declare(&mut engine, "Any Tick()");
    let mut host = ScriptedHost::new().on("Tick", |e, _| {
        if e.repeat_index("") == 1 {
            e.stop_function(false, true, false).unwrap();
        }
    });

    engine.call_repeating(&mut host, "Tick", vec![], 5).unwrap();

    assert_eq!(host.function_events().len(), 2);
}

#[test]
fn test_change_repeat_setting_extends_run() {
    let mut engine = engine();
    declare(&mut engine, "Any Grow()");
    let mut host = ScriptedHost::new().on("Grow", |e, _| {
        if e.repeats_total("") == 1 {
            e.change_repeat_setting(0, 3, false).unwrap();
        }
    });

    engine.call_function(&mut host, "Grow", vec![]).unwrap();

    assert_eq!(host.function_events().len(), 3);
}

#[test]
fn test_delay_and_repeat_expectations() {
    let mut engine = engine();
    engine
        .declare("Any OnlyLater()", Expected::Always, Expected::Optional, false)
        .unwrap();
    engine
        .declare("Any OnlyRepeat()", Expected::Optional, Expected::Always, false)
        .unwrap();
    engine
        .declare("Any Once()", Expected::Optional, Expected::Never, false)
        .unwrap();
    let mut host = ScriptedHost::new();

    assert!(matches!(
        engine.call_function(&mut host, "OnlyLater", vec![]),
        Err(ScriptError::DelayRequired { .. })
    ));
    assert!(matches!(
        engine.run_script(&mut host, "OnlyRepeat()"),
        Err(ScriptError::RepeatRequired { .. })
    ));
    assert!(engine.call_repeating(&mut host, "OnlyRepeat", vec![], 2).is_ok());
    assert!(matches!(
        engine.call_repeating(&mut host, "Once", vec![], 2),
        Err(ScriptError::RepeatNotAllowed { .. })
    ));
    assert_eq!(host.function_events(), vec!["OnlyRepeat", "OnlyRepeat"]);
}

#[test]
fn test_disabled_function_returns_default() {
    let mut engine = engine();
    declare(&mut engine, "Integer Off()");
    engine.set_enabled("Off", false).unwrap();
    let mut host = ScriptedHost::new();

    assert!(matches!(
        engine.call_function(&mut host, "Off", vec![]),
        Err(ScriptError::DisabledWithoutDefault { .. })
    ));

    engine.set_default_return("Off", Value::Integer(7)).unwrap();
    assert_eq!(engine.call_function(&mut host, "Off", vec![]), Ok(Value::Integer(7)));
    assert!(host.events.is_empty());
}

#[test]
fn test_unset_return_falls_back_to_default() {
    let mut engine = engine();
    declare(&mut engine, "Integer Quiet()");
    engine.set_default_return("Quiet", Value::Integer(42)).unwrap();
    let mut host = ScriptedHost::new();

    assert_eq!(engine.call_function(&mut host, "Quiet", vec![]), Ok(Value::Integer(42)));
}

#[test]
fn test_redirect_runs_target_body() {
    let mut engine = engine();
    declare(&mut engine, "Any Old(Integer n)");
    declare(&mut engine, "Any New(Integer n)");
    engine.set_redirect("Old", "New").unwrap();
    let mut host = ScriptedHost::new();

    engine.call_function(&mut host, "Old", vec![1.into()]).unwrap();

    assert_eq!(host.function_events(), vec!["New"]);
    assert!(matches!(
        engine.set_redirect("New", "new"),
        Err(ScriptError::RedirectToSelf { .. })
    ));
}

#[test]
fn test_owner_travels_with_event() {
    let mut engine = engine();
    declare(&mut engine, "Any Jump()");
    engine.set_owner("Jump", "player").unwrap();
    let mut host = ScriptedHost::new();

    engine.call_function(&mut host, "Jump", vec![]).unwrap();

    assert_eq!(
        host.events,
        vec![HostEvent::Function {
            name: "Jump".into(),
            owner: Some("player".into()),
        }]
    );
}

#[test]
fn test_foreach_runs_per_selector_until_cancelled() {
    let mut engine = engine();
    declare(&mut engine, "Any Each()");
    let mut host = ScriptedHost::new().on("Each", |e, h| {
        let selector = e.foreach_selector("");
        h.log.push(selector.to_string());
        if selector == 20 {
            e.stop_function(false, false, true).unwrap();
        }
    });

    engine.run_foreach(&mut host, "Each", vec![], &[10, 20, 30]).unwrap();

    assert_eq!(host.log, vec!["10", "20"]);
}

#[test]
fn test_selection_restored_around_body() {
    let mut engine = engine();
    declare(&mut engine, "Any Pick()");
    let mut host = ScriptedHost::new().on("Pick", |_, h| h.selection = 99);
    host.selection = 3;

    engine.call_function(&mut host, "Pick", vec![]).unwrap();

    assert_eq!(host.selection, 3);
    assert_eq!(host.restores, 1);
}

#[test]
fn test_call_site_recorded_on_frame() {
    let mut engine = engine();
    declare(&mut engine, "Any Where()");
    let mut host = ScriptedHost::new().on("Where", |e, h| {
        h.log.push(e.call_stack_text(false, -1));
    });
    host.site = "event line 12".into();

    engine.call_function(&mut host, "Where", vec![]).unwrap();

    assert_eq!(host.log, vec!["Where called from event line 12"]);
}
