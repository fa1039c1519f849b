//! Template declaration and setters through the engine

use super::helpers::{declare, engine, ScriptedHost};
use crate::config::EngineConfig;
use crate::engine::{Engine, Expected, ScriptError, Value, ValueType};

#[test]
fn test_redeclare_updates_policy_in_place() {
    let mut engine = engine();
    declare(&mut engine, "Integer Add(Integer x, Integer y = 0)");
    declare(&mut engine, "Any Other()");
    engine.set_default_return("Add", Value::Integer(1)).unwrap();

    engine
        .declare_with_flags("Integer add(Integer x, Integer y = 0)", 2, 0, 1)
        .unwrap();

    let names: Vec<_> = engine.templates().map(|t| t.name.clone()).collect();
    assert_eq!(names, vec!["Add", "Other"]);
    assert_eq!(engine.template_delaying("Add"), 2);
    assert_eq!(engine.template_repeating("Add"), 0);
    assert_eq!(engine.template_recursion_allowed("Add"), 1);
    assert_eq!(engine.template_default_return("Add"), Value::Unset);
}

#[test]
fn test_reserved_name_rejected_without_mutation() {
    let mut engine = engine();

    let result = engine.declare("Integer kfuncfs(Integer x)", Expected::Optional, Expected::Optional, false);

    assert!(matches!(result, Err(ScriptError::ReservedName { .. })));
    assert_eq!(engine.templates().count(), 0);
    assert_eq!(
        engine.last_error(),
        "declare: function name \"kfuncfs\" is invalid; KRFuncXX format will confuse the script parser"
    );
}

#[test]
fn test_invalid_flags_rejected() {
    let mut engine = engine();

    assert_eq!(
        engine.declare_with_flags("Any F()", 3, 1, 0),
        Err(ScriptError::InvalidFlag {
            op: "declare",
            what: "delaying expected",
            allowed: "0, 1 or 2",
            value: 3,
        })
    );
    assert!(matches!(
        engine.declare_with_flags("Any F()", 1, 1, 2),
        Err(ScriptError::InvalidFlag { what: "recursion allowed", .. })
    ));
    assert!(engine.template("F").is_none());
}

#[test]
fn test_declared_param_count_limited_by_slots() {
    let mut engine = Engine::new(EngineConfig {
        expression_slots: 4,
        ..EngineConfig::default()
    });

    assert!(engine
        .declare("Any Two(Any a, Any b)", Expected::Optional, Expected::Optional, false)
        .is_ok());
    assert_eq!(
        engine.declare("Any Three(Any a, Any b, Any c)", Expected::Optional, Expected::Optional, false),
        Err(ScriptError::TooManyParams {
            op: "declare",
            count: 3,
            max: 2,
        })
    );
}

#[test]
fn test_param_default_changes_are_visible_to_calls() {
    let mut engine = engine();
    declare(&mut engine, "Any Scale(Integer v, Integer by = 2)");
    let mut host = ScriptedHost::new().on("Scale", |e, h| {
        h.log.push(e.all_params_text("", " ", true));
    });

    engine.set_param_default("Scale", "by", Value::Float(0.5), false).unwrap();
    assert_eq!(engine.template_param_type("Scale", 1), "Float");
    assert_eq!(engine.template_param_default_by_name("Scale", "BY"), Value::Float(0.5));

    engine.call_function(&mut host, "Scale", vec![4.into()]).unwrap();
    assert_eq!(host.log, vec!["v = 4 by = 0.5f"]);
}

#[test]
fn test_param_default_ordering_enforced() {
    let mut engine = engine();
    declare(&mut engine, "Any F(Integer a, Integer b)");

    let result = engine.set_param_default("F", "a", Value::Integer(1), false);

    assert!(matches!(result, Err(ScriptError::RequiredAfterOptional { .. })));
    assert_eq!(engine.template_required_params("F"), 2);
    assert_eq!(engine.template_param_type("F", 0), "Integer");

    engine.set_param_default("F", "b", Value::Integer(1), false).unwrap();
    engine.set_param_default("F", "a", Value::Integer(1), false).unwrap();
    assert_eq!(engine.template_required_params("F"), 0);
}

#[test]
fn test_scoped_var_on_start_recorded_on_template() {
    let mut engine = engine();
    declare(&mut engine, "Any F()");

    engine.set_scoped_var_on_start("F", "speed", Value::Float(1.5), true).unwrap();

    let spec = &engine.template("f").unwrap().scoped_var_defaults[0];
    assert_eq!(spec.name, "speed");
    assert_eq!(spec.declared_type, ValueType::Float);
    assert!(spec.recursive_override);

    assert!(matches!(
        engine.set_scoped_var_on_start("F", " ", Value::Integer(1), false),
        Err(ScriptError::BlankName { .. })
    ));
}

#[test]
fn test_setters_with_blank_name_target_running_function() {
    let mut engine = engine();
    declare(&mut engine, "Any Tag()");
    let mut host = ScriptedHost::new().on("Tag", |e, _| {
        e.set_owner("", "player").unwrap();
        e.set_default_return("", Value::from("done")).unwrap();
    });

    engine.call_function(&mut host, "Tag", vec![]).unwrap();

    assert_eq!(engine.template_owner("Tag"), "player");
    assert_eq!(engine.last_return(), &Value::from("done"));

    assert_eq!(
        engine.set_enabled("", false),
        Err(ScriptError::NoRunningFunction { op: "set enabled" })
    );
}

#[test]
fn test_owner_and_redirect_queries() {
    let mut engine = engine();
    declare(&mut engine, "Any Old()");
    declare(&mut engine, "Any New()");

    engine.set_redirect("Old", "new").unwrap();
    engine.set_owner("New", "enemy").unwrap();

    assert_eq!(engine.template_redirect("Old"), "New");
    assert_eq!(engine.template_owner("new"), "enemy");
    engine.set_owner("New", "").unwrap();
    assert_eq!(engine.template_owner("New"), "");

    assert!(matches!(
        engine.set_redirect("Old", "Missing"),
        Err(ScriptError::TemplateNotFound { .. })
    ));
    assert_eq!(engine.template_redirect("Old"), "New");
}
