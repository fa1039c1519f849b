//! Engine error types
//!
//! Every error is non-fatal: the failing operation becomes a no-op and the text is
//! recorded in the session's diagnostic log.

use super::types::ValueType;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScriptError>;

/// Broad class of an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input or an unresolved name.
    Validation,
    /// Well-formed request the engine refuses in its current state.
    Policy,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScriptError {
    #[error("{op}: you must supply a function signature, not blank")]
    BlankSignature { op: &'static str },

    #[error("{op}: function signature \"{signature}\" not parseable")]
    UnparseableSignature { op: &'static str, signature: String },

    #[error("{op}: return type \"{type_name}\" not recognised; use Any, String, Integer, or Float")]
    UnknownReturnType { op: &'static str, type_name: String },

    #[error("{op}: function name \"{name}\" is invalid; KRFuncXX format will confuse the script parser")]
    ReservedName { op: &'static str, name: String },

    #[error("{op}: parameter \"{param}\" (index {index}) has unrecognised type \"{type_name}\"; use Any, String, Integer, or Float")]
    UnknownParamType {
        op: &'static str,
        param: String,
        index: usize,
        type_name: String,
    },

    #[error("{op}: parameter \"{param}\" (index {index}) has the same name as previous parameter index {previous_index}")]
    DuplicateParam {
        op: &'static str,
        param: String,
        index: usize,
        previous_index: usize,
    },

    #[error("{op}: parameter \"{param}\" (index {index}) has no default value, but earlier parameter \"{previous}\" (index {previous_index}) has a default; all parameters with defaults must be at the end of the parameter list")]
    RequiredAfterOptional {
        op: &'static str,
        param: String,
        index: usize,
        previous: String,
        previous_index: usize,
    },

    #[error("{op}: parameter \"{param}\" (index {index}) has an empty default value; don't include the '=' if you want no default")]
    EmptyDefault {
        op: &'static str,
        param: String,
        index: usize,
    },

    #[error("{op}: value \"{text}\" for parameter \"{param}\" (index {index}) is not a valid {expected}")]
    InvalidLiteral {
        op: &'static str,
        param: String,
        index: usize,
        text: String,
        expected: ValueType,
    },

    #[error("{op}: too many parameters to run this function via expression; you have {count} parameters, but max is {max}; consider using scoped vars on start instead")]
    TooManyParams {
        op: &'static str,
        count: usize,
        max: usize,
    },

    #[error("{op}: function script \"{script}\" not parseable")]
    UnparseableCall { op: &'static str, script: String },

    #[error("{op}: {what} is blank")]
    BlankName { op: &'static str, what: &'static str },

    #[error("{op}: function template \"{name}\" not found")]
    TemplateNotFound { op: &'static str, name: String },

    #[error("{op}: function \"{name}\" has no template, and templates are required")]
    TemplateRequired { op: &'static str, name: String },

    #[error("{op}: no function is running")]
    NoRunningFunction { op: &'static str },

    #[error("{op}: function \"{name}\" is not in the call stack")]
    FunctionNotRunning { op: &'static str, name: String },

    #[error("{op}: function \"{function}\" has no parameter named \"{param}\"")]
    ParamNotFound {
        op: &'static str,
        function: String,
        param: String,
    },

    #[error("{op}: parameter index {index} is out of range; function \"{function}\" has {count} parameters")]
    ParamIndexOutOfRange {
        op: &'static str,
        function: String,
        index: i32,
        count: usize,
    },

    #[error("{op}: function \"{function}\" was given {supplied} arguments, but takes at most {max}")]
    TooManyArgs {
        op: &'static str,
        function: String,
        supplied: usize,
        max: usize,
    },

    #[error("{op}: function \"{function}\" requires parameter \"{param}\" (index {index}), which was not passed")]
    MissingArgument {
        op: &'static str,
        function: String,
        param: String,
        index: usize,
    },

    #[error("{op}: scoped var \"{name}\" not found")]
    ScopedVarNotFound { op: &'static str, name: String },

    #[error("{op}: param/scoped var \"{name}\" is {expected}, and does not accept {offered} type")]
    TypeMismatch {
        op: &'static str,
        name: String,
        expected: ValueType,
        offered: ValueType,
    },

    #[error("Can't return type {offered} from function \"{function}\", expected {expected}")]
    ReturnTypeMismatch {
        function: String,
        expected: ValueType,
        offered: ValueType,
    },

    #[error("Function \"{function}\" is already running and does not allow recursion")]
    RecursionNotAllowed { function: String },

    #[error("Function \"{function}\" is expected to be called delayed only")]
    DelayRequired { function: String },

    #[error("Function \"{function}\" is not allowed to be called delayed")]
    DelayNotAllowed { function: String },

    #[error("Function \"{function}\" is expected to be called repeating only")]
    RepeatRequired { function: String },

    #[error("Function \"{function}\" is not allowed to be called repeating")]
    RepeatNotAllowed { function: String },

    #[error("Function \"{function}\" is disabled, and has no default return value")]
    DisabledWithoutDefault { function: String },

    #[error("Couldn't set function \"{function}\" to redirect to \"{target}\"; same function")]
    RedirectToSelf { function: String, target: String },

    #[error("Function \"{function}\" redirects in a loop")]
    RedirectCycle { function: String },

    #[error("Can't abort with an empty reason")]
    EmptyAbortReason,

    #[error("Can't abort twice; second reason \"{reason}\" discarded")]
    AlreadyAborted { reason: String },

    #[error("Aborting function \"{function}\" to function \"{target}\" failed; unwind function \"{target}\" not in call stack")]
    UnwindTargetNotFound { function: String, target: String },

    #[error("{op}: parameter \"{what}\" must be {allowed}, you supplied {value}")]
    InvalidFlag {
        op: &'static str,
        what: &'static str,
        allowed: &'static str,
        value: i32,
    },

    #[error("{op}: {detail}")]
    InvalidRepeatSetting { op: &'static str, detail: String },

    #[error("Use of StopFunction with all cancel parameters off; this will have no effect")]
    NothingToStop,

    #[error("{op}: {what} must not be negative, you supplied {value}")]
    NegativeAmount {
        op: &'static str,
        what: &'static str,
        value: i32,
    },

    #[error("Couldn't get call stack; no functions running")]
    EmptyCallStack,

    #[error("Couldn't get call stack; rewind count {count} is invalid")]
    InvalidRewindCount { count: i32 },

    #[error("{op}: empty loop name not allowed")]
    EmptyLoopName { op: &'static str },

    #[error("Can't run two internal loops at once; already running loop \"{open}\", can't run loop \"{requested}\"")]
    LoopAlreadyOpen { open: String, requested: String },

    #[error("{op}: no internal loop running")]
    NoLoopOpen { op: &'static str },

    #[error("{op}: internal loop \"{loop_name}\" is not a {expected} loop")]
    WrongLoopKind {
        op: &'static str,
        loop_name: String,
        expected: &'static str,
    },
}

impl ScriptError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScriptError::RecursionNotAllowed { .. }
            | ScriptError::DelayRequired { .. }
            | ScriptError::DelayNotAllowed { .. }
            | ScriptError::RepeatRequired { .. }
            | ScriptError::RepeatNotAllowed { .. }
            | ScriptError::DisabledWithoutDefault { .. }
            | ScriptError::AlreadyAborted { .. }
            | ScriptError::LoopAlreadyOpen { .. }
            | ScriptError::TemplateRequired { .. }
            | ScriptError::RedirectCycle { .. } => ErrorKind::Policy,
            _ => ErrorKind::Validation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_operation_and_value() {
        let err = ScriptError::UnknownReturnType {
            op: "declare",
            type_name: "Bool".into(),
        };
        assert_eq!(
            err.to_string(),
            "declare: return type \"Bool\" not recognised; use Any, String, Integer, or Float"
        );
    }

    #[test]
    fn test_return_mismatch_names_types() {
        let err = ScriptError::ReturnTypeMismatch {
            function: "Add".into(),
            expected: ValueType::Integer,
            offered: ValueType::String,
        };
        assert_eq!(
            err.to_string(),
            "Can't return type String from function \"Add\", expected Integer"
        );
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            ScriptError::RecursionNotAllowed { function: "f".into() }.kind(),
            ErrorKind::Policy
        );
        assert_eq!(
            ScriptError::TemplateNotFound { op: "x", name: "f".into() }.kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            ScriptError::LoopAlreadyOpen { open: "a".into(), requested: "b".into() }.kind(),
            ErrorKind::Policy
        );
    }
}
