//! Function template registry
//!
//! Name-keyed (case-insensitive) table of declared templates, kept in declaration
//! order so template loops are stable.

use tracing::debug;

use super::errors::{Result, ScriptError};
use super::types::{Expected, FunctionTemplate, Param, ScopedVar, Value, ValueType};
use crate::parser::{self, ParamAst};

#[derive(Debug, Default, Clone)]
pub struct TemplateRegistry {
    templates: Vec<FunctionTemplate>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FunctionTemplate> {
        self.templates.iter()
    }

    pub fn get(&self, name: &str) -> Option<&FunctionTemplate> {
        self.templates.iter().find(|t| t.matches(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut FunctionTemplate> {
        self.templates.iter_mut().find(|t| t.matches(name))
    }

    /// Look up by name, failing with a diagnostic naming `op`.
    pub fn require(&self, op: &'static str, name: &str) -> Result<&FunctionTemplate> {
        self.get(name).ok_or_else(|| ScriptError::TemplateNotFound {
            op,
            name: name.to_string(),
        })
    }

    pub fn require_mut(&mut self, op: &'static str, name: &str) -> Result<&mut FunctionTemplate> {
        self.get_mut(name).ok_or_else(|| ScriptError::TemplateNotFound {
            op,
            name: name.to_string(),
        })
    }

    /// Add a template built elsewhere (e.g. synthesized for an undeclared call).
    pub fn insert(&mut self, template: FunctionTemplate) {
        match self.get_mut(&template.name) {
            Some(existing) => *existing = template,
            None => self.templates.push(template),
        }
    }

    /* ===================== Declaration ===================== */

    /// Declare or re-declare a template from its signature.
    ///
    /// Nothing is mutated unless every check passes. A re-declaration updates the
    /// policy fields, return type and default return in place; the parameter list
    /// is kept if its names and types are unchanged, and replaced otherwise.
    pub fn declare(
        &mut self,
        signature: &str,
        delaying: Expected,
        repeating: Expected,
        recursion_allowed: bool,
        max_params: usize,
    ) -> Result<&FunctionTemplate> {
        const OP: &str = "declare";

        if signature.trim().is_empty() {
            return Err(ScriptError::BlankSignature { op: OP });
        }

        let ast = parser::parse_signature(signature).map_err(|_| ScriptError::UnparseableSignature {
            op: OP,
            signature: signature.to_string(),
        })?;

        let return_type =
            ValueType::from_keyword(&ast.return_type).ok_or_else(|| ScriptError::UnknownReturnType {
                op: OP,
                type_name: ast.return_type.clone(),
            })?;

        if parser::is_reserved_name(&ast.name) {
            return Err(ScriptError::ReservedName { op: OP, name: ast.name });
        }

        let params = build_params(OP, &ast.params)?;

        if params.len() > max_params {
            return Err(ScriptError::TooManyParams {
                op: OP,
                count: params.len(),
                max: max_params,
            });
        }

        let index = match self.templates.iter().position(|t| t.matches(&ast.name)) {
            Some(index) => {
                let existing = &mut self.templates[index];
                existing.delaying = delaying;
                existing.repeating = repeating;
                existing.recursion_allowed = recursion_allowed;
                existing.return_type = return_type;
                existing.default_return = Value::Unset;
                existing.params = params;
                debug!(function = %existing.name, "re-declared function template");
                index
            }
            None => {
                let mut template =
                    FunctionTemplate::new(ast.name, return_type, delaying, repeating, recursion_allowed);
                template.params = params;
                debug!(function = %template.name, params = template.params.len(), "declared function template");
                self.templates.push(template);
                self.templates.len() - 1
            }
        };

        Ok(&self.templates[index])
    }

    /* ===================== Template Setters ===================== */

    pub fn set_default_return(&mut self, op: &'static str, name: &str, value: Value) -> Result<()> {
        self.require_mut(op, name)?.default_return = value;
        Ok(())
    }

    /// Set (or clear, with `Value::Unset`) a parameter's default.
    ///
    /// The parameter's declared type follows the value's type unless
    /// `treat_as_any` is set. Fails if the change would leave a required
    /// parameter after an optional one.
    pub fn set_param_default(
        &mut self,
        op: &'static str,
        name: &str,
        param_name: &str,
        value: Value,
        treat_as_any: bool,
    ) -> Result<()> {
        let template = self.require_mut(op, name)?;
        let index = template
            .param_index(param_name)
            .ok_or_else(|| ScriptError::ParamNotFound {
                op,
                function: template.name.clone(),
                param: param_name.to_string(),
            })?;

        let mut params = template.params.clone();
        let param = &mut params[index];
        if treat_as_any {
            param.declared_type = ValueType::Any;
        } else if !value.is_unset() {
            param.declared_type = value.value_type();
        }
        param.default = value;
        check_default_order(op, &params)?;

        template.params = params;
        Ok(())
    }

    /// Create or update a scoped var the template creates when it starts.
    pub fn set_scoped_var_on_start(
        &mut self,
        op: &'static str,
        name: &str,
        var_name: &str,
        value: Value,
        recursive_override: bool,
    ) -> Result<()> {
        if var_name.trim().is_empty() {
            return Err(ScriptError::BlankName { op, what: "scoped var name" });
        }
        let template = self.require_mut(op, name)?;
        let declared_type = value.value_type();
        match template.scoped_var_defaults.iter_mut().find(|s| s.matches(var_name)) {
            Some(spec) => {
                spec.declared_type = declared_type;
                spec.value = value;
                spec.recursive_override = recursive_override;
            }
            None => template.scoped_var_defaults.push(ScopedVar {
                name: var_name.to_string(),
                declared_type,
                value,
                recursive_override,
                level: 0,
            }),
        }
        Ok(())
    }

    /// Remove a scoped-var-on-start spec; a missing spec is not an error.
    pub fn cancel_scoped_var_on_start(&mut self, op: &'static str, name: &str, var_name: &str) -> Result<()> {
        let template = self.require_mut(op, name)?;
        if var_name.trim().is_empty() {
            return Err(ScriptError::BlankName { op, what: "scoped var name" });
        }
        template.scoped_var_defaults.retain(|s| !s.matches(var_name));
        Ok(())
    }

    pub fn set_enabled(&mut self, op: &'static str, name: &str, enabled: bool) -> Result<()> {
        self.require_mut(op, name)?.enabled = enabled;
        Ok(())
    }

    /// Redirect calls of `name` to `target`.
    pub fn set_redirect(&mut self, op: &'static str, name: &str, target: &str) -> Result<()> {
        let target_name = self.require(op, target)?.name.clone();
        let template = self.require_mut(op, name)?;
        if template.matches(&target_name) {
            return Err(ScriptError::RedirectToSelf {
                function: template.name.clone(),
                target: target_name,
            });
        }
        template.redirect = Some(target_name);
        Ok(())
    }

    pub fn set_owner(&mut self, op: &'static str, name: &str, owner: Option<String>) -> Result<()> {
        self.require_mut(op, name)?.owner = owner.filter(|o| !o.is_empty());
        Ok(())
    }

    /// Follow redirects from `name` to the template that actually runs.
    pub fn resolve_redirects(&self, op: &'static str, name: &str) -> Result<&FunctionTemplate> {
        let mut current = self.require(op, name)?;
        let mut visited = vec![current.name.to_ascii_lowercase()];
        while let Some(next) = current.redirect.as_deref() {
            let next = self.require(op, next)?;
            let key = next.name.to_ascii_lowercase();
            if visited.contains(&key) {
                return Err(ScriptError::RedirectCycle {
                    function: name.to_string(),
                });
            }
            visited.push(key);
            current = next;
        }
        Ok(current)
    }
}

/* ===================== Helpers ===================== */

fn build_params(op: &'static str, asts: &[ParamAst]) -> Result<Vec<Param>> {
    let mut params: Vec<Param> = Vec::with_capacity(asts.len());

    for (index, ast) in asts.iter().enumerate() {
        let declared_type =
            ValueType::from_keyword(&ast.type_name).ok_or_else(|| ScriptError::UnknownParamType {
                op,
                param: ast.name.clone(),
                index,
                type_name: ast.type_name.clone(),
            })?;

        if let Some(previous_index) = params.iter().position(|p| p.matches(&ast.name)) {
            return Err(ScriptError::DuplicateParam {
                op,
                param: ast.name.clone(),
                index,
                previous_index,
            });
        }

        let mut param = Param::new(ast.name.clone(), declared_type);
        match ast.default.as_deref() {
            None => {
                if let Some(previous) = params.last().filter(|p| !p.is_required()) {
                    return Err(ScriptError::RequiredAfterOptional {
                        op,
                        param: ast.name.clone(),
                        index,
                        previous: previous.name.clone(),
                        previous_index: index - 1,
                    });
                }
            }
            Some("") => {
                return Err(ScriptError::EmptyDefault {
                    op,
                    param: ast.name.clone(),
                    index,
                })
            }
            Some(text) => {
                param.default = parser::parse_literal(text, declared_type).ok_or_else(|| {
                    ScriptError::InvalidLiteral {
                        op,
                        param: ast.name.clone(),
                        index,
                        text: text.to_string(),
                        expected: declared_type,
                    }
                })?;
            }
        }
        params.push(param);
    }

    Ok(params)
}

fn check_default_order(op: &'static str, params: &[Param]) -> Result<()> {
    let mut first_optional: Option<usize> = None;
    for (index, param) in params.iter().enumerate() {
        match first_optional {
            None if !param.is_required() => first_optional = Some(index),
            Some(previous_index) if param.is_required() => {
                return Err(ScriptError::RequiredAfterOptional {
                    op,
                    param: param.name.clone(),
                    index,
                    previous: params[previous_index].name.clone(),
                    previous_index,
                })
            }
            _ => {}
        }
    }
    Ok(())
}
