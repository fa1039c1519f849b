//! PEST-based parser for function signatures and call expressions
//!
//! Produces plain syntax trees; type checking and template construction happen in
//! the registry.

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

use crate::engine::types::{Value, ValueType};


#[derive(Parser)]
#[grammar = "parser/script.pest"]
struct ScriptParser;

/* ===================== Syntax Trees ===================== */

/// `returnType name(type param [= default], ...)`
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureAst {
    pub return_type: String,
    pub name: String,
    pub params: Vec<ParamAst>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamAst {
    pub type_name: String,
    pub name: String,
    /// `None` when there is no `=`; `Some("")` when the `=` has nothing after it.
    pub default: Option<String>,
}

/// `name(arg, [type] arg, ...)`
#[derive(Debug, Clone, PartialEq)]
pub struct CallAst {
    pub name: String,
    pub args: Vec<ArgAst>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArgAst {
    pub type_hint: Option<ValueType>,
    /// Literal text as written, quotes included.
    pub text: String,
}

/* ===================== Error Types ===================== */

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("parse error: {0}")]
    PestError(String),
    #[error("unexpected syntax: {0}")]
    BuildError(String),
}

impl From<pest::error::Error<Rule>> for ParseError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        ParseError::PestError(err.to_string())
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/* ===================== Public API ===================== */

/// Parse a function signature such as `Integer Add(Integer x, Integer y = 0)`.
pub fn parse_signature(source: &str) -> ParseResult<SignatureAst> {
    let root = first_pair(ScriptParser::parse(Rule::signature, source)?)?;

    let mut return_type = None;
    let mut name = None;
    let mut params = Vec::new();
    for pair in root.into_inner() {
        match pair.as_rule() {
            Rule::type_keyword => return_type = Some(pair.as_str().to_string()),
            Rule::function_name => name = Some(pair.as_str().to_string()),
            Rule::param_list => {
                for param in pair.into_inner() {
                    params.push(build_param(param)?);
                }
            }
            Rule::EOI => {}
            other => return Err(unexpected(other)),
        }
    }

    Ok(SignatureAst {
        return_type: return_type.ok_or_else(|| missing("return type"))?,
        name: name.ok_or_else(|| missing("function name"))?,
        params,
    })
}

/// Parse a call expression such as `Add(5, int 2)`.
pub fn parse_call(source: &str) -> ParseResult<CallAst> {
    let root = first_pair(ScriptParser::parse(Rule::call, source.trim())?)?;

    let mut name = None;
    let mut args = Vec::new();
    for pair in root.into_inner() {
        match pair.as_rule() {
            Rule::function_name => name = Some(pair.as_str().to_string()),
            Rule::arg_list => {
                for arg in pair.into_inner() {
                    args.push(build_arg(arg)?);
                }
            }
            Rule::EOI => {}
            other => return Err(unexpected(other)),
        }
    }

    Ok(CallAst {
        name: name.ok_or_else(|| missing("function name"))?,
        args,
    })
}

/// Convert literal text to a value of the declared type.
///
/// Strings may be double-quoted with `\"`, `\\`, `\n`, `\t`, `\r` escapes; a bare
/// word is taken verbatim. `Any` infers the type from the literal's shape.
/// Returns `None` if the text is not a valid literal of that type.
pub fn parse_literal(text: &str, declared: ValueType) -> Option<Value> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let quoted = is_quoted(text);

    match declared {
        ValueType::Integer if !quoted => text.parse::<i32>().ok().map(Value::Integer),
        ValueType::Float if !quoted => text.parse::<f64>().ok().map(Value::Float),
        ValueType::Integer | ValueType::Float => None,
        ValueType::String if quoted => Some(Value::String(unescape(&text[1..text.len() - 1]))),
        ValueType::String => Some(Value::String(text.to_string())),
        ValueType::Any => {
            if quoted {
                Some(Value::String(unescape(&text[1..text.len() - 1])))
            } else if let Ok(i) = text.parse::<i32>() {
                Some(Value::Integer(i))
            } else if let Ok(f) = text.parse::<f64>() {
                Some(Value::Float(f))
            } else {
                Some(Value::String(text.to_string()))
            }
        }
    }
}

/// Whether a function name would be mistaken for one of the built-in
/// `KRFuncXX` calls of the text-script grammar: `k?r?f?func[fis]*$?`.
pub fn is_reserved_name(name: &str) -> bool {
    const PREFIXES: [&str; 8] = ["", "k", "r", "f", "kr", "kf", "rf", "krf"];

    let lower = name.to_ascii_lowercase();
    let body = lower.strip_suffix('$').unwrap_or(&lower);
    PREFIXES.iter().any(|prefix| {
        body.strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix("func"))
            .is_some_and(|tail| tail.chars().all(|c| matches!(c, 'f' | 'i' | 's')))
    })
}

/* ===================== AST Builder ===================== */

fn build_param(pair: Pair<Rule>) -> ParseResult<ParamAst> {
    let mut type_name = None;
    let mut name = None;
    let mut default = None;
    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::param_type => type_name = Some(part.as_str().to_string()),
            Rule::param_name => name = Some(part.as_str().to_string()),
            Rule::default_clause => {
                let text = part
                    .into_inner()
                    .next()
                    .map(|literal| literal.as_str().trim().to_string())
                    .unwrap_or_default();
                default = Some(text);
            }
            other => return Err(unexpected(other)),
        }
    }

    Ok(ParamAst {
        type_name: type_name.ok_or_else(|| missing("parameter type"))?,
        name: name.ok_or_else(|| missing("parameter name"))?,
        default,
    })
}

fn build_arg(pair: Pair<Rule>) -> ParseResult<ArgAst> {
    let mut type_hint = None;
    let mut text = None;
    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::type_hint => type_hint = ValueType::from_keyword(part.as_str()),
            Rule::literal => text = Some(part.as_str().trim().to_string()),
            other => return Err(unexpected(other)),
        }
    }

    Ok(ArgAst {
        type_hint,
        text: text.ok_or_else(|| missing("argument"))?,
    })
}

fn first_pair(mut pairs: pest::iterators::Pairs<'_, Rule>) -> ParseResult<Pair<'_, Rule>> {
    pairs.next().ok_or_else(|| missing("input"))
}

fn unexpected(rule: Rule) -> ParseError {
    ParseError::BuildError(format!("unexpected rule {:?}", rule))
}

fn missing(what: &str) -> ParseError {
    ParseError::BuildError(format!("missing {}", what))
}

fn is_quoted(text: &str) -> bool {
    text.len() >= 2 && text.starts_with('"') && text.ends_with('"')
}

fn unescape(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
