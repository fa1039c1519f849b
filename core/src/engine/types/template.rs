//! Function template types

use super::values::{Value, ValueType};
use serde::{Deserialize, Serialize};

/// Whether a function is expected to be called delayed / repeating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Expected {
    Never = 0,
    Optional = 1,
    Always = 2,
}

impl Expected {
    /// Map the host's 0/1/2 flag to a policy.
    pub fn from_flag(flag: i32) -> Option<Self> {
        match flag {
            0 => Some(Expected::Never),
            1 => Some(Expected::Optional),
            2 => Some(Expected::Always),
            _ => None,
        }
    }
}

/// A declared parameter.
///
/// `default` of `Unset` marks the parameter as required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub declared_type: ValueType,
    pub default: Value,
}

impl Param {
    pub fn new(name: impl Into<String>, declared_type: ValueType) -> Self {
        Self {
            name: name.into(),
            declared_type,
            default: Value::Unset,
        }
    }

    pub fn is_required(&self) -> bool {
        self.default.is_unset()
    }

    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// A scoped variable, either live in the store or as a template's on-start spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopedVar {
    pub name: String,
    pub declared_type: ValueType,
    pub value: Value,
    /// Whether a recursive call re-creates the variable instead of inheriting it.
    pub recursive_override: bool,
    /// Call-stack depth at creation.
    pub level: usize,
}

impl ScopedVar {
    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Spec of a scoped variable a template creates whenever it starts.
pub type ScopedVarSpec = ScopedVar;

/// Declared shape of a callable function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionTemplate {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: ValueType,
    pub delaying: Expected,
    pub repeating: Expected,
    pub recursion_allowed: bool,
    pub enabled: bool,
    pub default_return: Value,
    /// Name of the template calls are redirected to, if any.
    pub redirect: Option<String>,
    /// Host object the function body runs on.
    pub owner: Option<String>,
    pub scoped_var_defaults: Vec<ScopedVarSpec>,
}

impl FunctionTemplate {
    pub fn new(
        name: impl Into<String>,
        return_type: ValueType,
        delaying: Expected,
        repeating: Expected,
        recursion_allowed: bool,
    ) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            return_type,
            delaying,
            repeating,
            recursion_allowed,
            enabled: true,
            default_return: Value::Unset,
            redirect: None,
            owner: None,
            scoped_var_defaults: Vec::new(),
        }
    }

    /// Template made up on the spot for a call to an undeclared function.
    ///
    /// Parameters are untyped and named `a`, `b`, `c`, ...
    pub fn synthesized(name: impl Into<String>, arg_count: usize) -> Self {
        let mut template = Self::new(name, ValueType::Any, Expected::Optional, Expected::Optional, false);
        template.params = (0..arg_count)
            .map(|i| Param::new(synthesized_param_name(i), ValueType::Any))
            .collect();
        template
    }

    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    pub fn param(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|p| p.matches(name))
    }

    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.matches(name))
    }

    pub fn required_param_count(&self) -> usize {
        self.params.iter().filter(|p| p.is_required()).count()
    }
}

fn synthesized_param_name(index: usize) -> String {
    let mut name = String::new();
    let mut i = index;
    loop {
        name.insert(0, (b'a' + (i % 26) as u8) as char);
        if i < 26 {
            break;
        }
        i = i / 26 - 1;
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesized_names() {
        let t = FunctionTemplate::synthesized("foo", 3);
        let names: Vec<_> = t.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(synthesized_param_name(26), "aa");
        assert!(t.params.iter().all(|p| p.declared_type == ValueType::Any));
    }

    #[test]
    fn test_param_lookup_is_case_insensitive() {
        let mut t = FunctionTemplate::new("F", ValueType::Any, Expected::Never, Expected::Never, false);
        t.params.push(Param::new("Count", ValueType::Integer));
        assert_eq!(t.param_index("count"), Some(0));
        assert!(t.param("COUNT").is_some());
        assert!(t.matches("f"));
    }
}
