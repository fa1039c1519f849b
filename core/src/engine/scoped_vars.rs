//! Scoped variable store
//!
//! Append-only list of variables tagged with the call-stack depth they were created
//! at. A variable is visible while `level <= depth`; lookups take the most recently
//! created match.

use super::errors::{Result, ScriptError};
use super::types::{ScopedVar, Value};

#[derive(Debug, Default, Clone)]
pub struct ScopedVarStore {
    vars: Vec<ScopedVar>,
}

impl ScopedVarStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn get(&self, name: &str, depth: usize) -> Option<&ScopedVar> {
        self.vars
            .iter()
            .rev()
            .find(|v| v.level <= depth && v.matches(name))
    }

    fn get_mut(&mut self, name: &str, depth: usize) -> Option<&mut ScopedVar> {
        self.vars
            .iter_mut()
            .rev()
            .find(|v| v.level <= depth && v.matches(name))
    }

    /// Value of a visible variable, or `Unset` if there is none.
    pub fn value(&self, name: &str, depth: usize) -> Value {
        self.get(name, depth).map(|v| v.value.clone()).unwrap_or_default()
    }

    /// Overwrite a visible variable, or create it at `depth` if permitted.
    ///
    /// An existing variable only accepts values its declared type allows; a new one
    /// takes the type of its first value.
    pub fn set(
        &mut self,
        op: &'static str,
        name: &str,
        value: Value,
        depth: usize,
        create_if_absent: bool,
    ) -> Result<()> {
        if name.trim().is_empty() {
            return Err(ScriptError::BlankName { op, what: "scoped var name" });
        }

        match self.get_mut(name, depth) {
            Some(var) => {
                let offered = value.value_type();
                if !value.is_unset() && !var.declared_type.accepts(offered) {
                    return Err(ScriptError::TypeMismatch {
                        op,
                        name: var.name.clone(),
                        expected: var.declared_type,
                        offered,
                    });
                }
                var.value = value;
                Ok(())
            }
            None if create_if_absent => {
                self.vars.push(ScopedVar {
                    name: name.to_string(),
                    declared_type: value.value_type(),
                    value,
                    recursive_override: true,
                    level: depth,
                });
                Ok(())
            }
            None => Err(ScriptError::ScopedVarNotFound {
                op,
                name: name.to_string(),
            }),
        }
    }

    /// Create a variable from a template's on-start spec.
    pub fn push_spec(&mut self, spec: &ScopedVar, depth: usize) {
        self.vars.push(ScopedVar {
            level: depth,
            ..spec.clone()
        });
    }

    /// Visible variables, oldest first. Without `include_inherited` only the
    /// variables created at exactly `depth` are returned.
    pub fn visible(&self, depth: usize, include_inherited: bool) -> Vec<&ScopedVar> {
        self.vars
            .iter()
            .filter(|v| if include_inherited { v.level <= depth } else { v.level == depth })
            .collect()
    }
}
