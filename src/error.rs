//! Error types for signature construction, conversion, and dispatch.
//!
//! Construction problems surface eagerly as [`DefinitionError`]; a partially
//! built dispatcher is never returned. At call time the dispatcher produces
//! exactly one kind of error, [`ArgumentsError`], with structured fields for
//! programmatic recovery. [`ConversionError`] is raised by the one-shot
//! `convert` helper when no conversion path exists.

use thiserror::Error;

use crate::value::Value;

fn hint_suffix(hint: &Option<String>) -> String {
    match hint {
        Some(h) => format!(". Did you mean \"{h}\"?"),
        None => String::new(),
    }
}

/// Errors raised while building a dispatcher or mutating the registry.
#[derive(Debug, Clone, Error)]
pub enum DefinitionError {
    #[error("invalid parameter specification \"{0}\"")]
    InvalidParam(String),

    /// A signature referenced a type name the registry does not know.
    /// When a case-insensitive match exists, it is offered as a hint.
    #[error("unknown type \"{name}\"{}", hint_suffix(.hint))]
    UnknownType { name: String, hint: Option<String> },

    /// `...` on a parameter that is not the last one.
    #[error("variadic parameter \"{0}\" is only allowed on the last position")]
    VariadicPosition(String),

    /// Two expanded signatures collapsed to the same key with different
    /// implementations and no order between them.
    #[error("signature \"{0}\" is defined twice")]
    DuplicateSignature(String),

    /// Overlapping parameters at a tree node where one side is variadic.
    #[error("conflicting parameter types \"{variadic}\" and \"{other}\" at index {index}")]
    ConflictingParams {
        variadic: String,
        other: String,
        index: usize,
    },

    #[error("invalid type entry: {0}")]
    InvalidTypeEntry(String),

    #[error("invalid conversion: {0}")]
    InvalidConversion(String),

    #[error("no signatures provided")]
    EmptySignatureSet,

    /// Merging dispatchers that carry different non-empty names.
    #[error("cannot merge dispatchers named \"{first}\" and \"{second}\"")]
    NameConflict { first: String, second: String },

    /// The same signature key maps to different implementations across
    /// merged dispatchers.
    #[error("signature \"{0}\" has conflicting implementations")]
    MergeConflict(String),

    /// Exact `find` lookup failed.
    #[error("signature \"{0}\" not found")]
    SignatureNotFound(String),
}

/// No conversion path exists from `from` to `to`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot convert from \"{from}\" to \"{to}\"")]
pub struct ConversionError {
    pub from: String,
    pub to: String,
}

/// Classification of a dispatch failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentsErrorKind {
    TooFew,
    TooMany,
    UnexpectedType,
}

/// The single error kind a materialized dispatcher produces at call time.
///
/// Carries the dispatcher name, the argument count of the call, the offending
/// index, the actual value (classified against the registry snapshot) and the
/// list of expected type names.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentsError {
    fn_name: String,
    argc: usize,
    index: usize,
    actual: Option<Value>,
    actual_type: Option<String>,
    expected: Vec<String>,
    kind: ArgumentsErrorKind,
}

impl ArgumentsError {
    /// More arguments than any signature accepts. `expected` is the accepted
    /// count (`index`), `actual` the count given (`argc`).
    pub(crate) fn too_many(fn_name: &str, argc: usize, index: usize) -> Self {
        ArgumentsError {
            fn_name: fn_name.to_string(),
            argc,
            index,
            actual: None,
            actual_type: None,
            expected: Vec::new(),
            kind: ArgumentsErrorKind::TooMany,
        }
    }

    /// No accepted type matched at `index`. Classified as an unexpected type
    /// when the argument exists and `any` was not among the candidates,
    /// otherwise as too few arguments.
    pub(crate) fn mismatch(
        fn_name: &str,
        argc: usize,
        index: usize,
        actual: Option<Value>,
        actual_type: Option<String>,
        expected: Vec<String>,
    ) -> Self {
        let kind = if argc > index && !expected.iter().any(|t| t == "any") {
            ArgumentsErrorKind::UnexpectedType
        } else {
            ArgumentsErrorKind::TooFew
        };
        ArgumentsError {
            fn_name: fn_name.to_string(),
            argc,
            index,
            actual,
            actual_type,
            expected,
            kind,
        }
    }

    /// Name of the dispatcher that produced the error (may be empty).
    pub fn fn_name(&self) -> &str {
        &self.fn_name
    }

    /// Number of arguments in the failing call.
    pub fn argc(&self) -> usize {
        self.argc
    }

    /// Argument index the failure is reported at.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The offending argument value, when one exists at `index`.
    pub fn actual(&self) -> Option<&Value> {
        self.actual.as_ref()
    }

    /// Registry classification of the offending value.
    pub fn actual_type(&self) -> Option<&str> {
        self.actual_type.as_deref()
    }

    /// Type names that would have been accepted at `index`.
    pub fn expected(&self) -> &[String] {
        &self.expected
    }

    pub fn kind(&self) -> ArgumentsErrorKind {
        self.kind
    }

    fn display_name(&self) -> &str {
        if self.fn_name.is_empty() {
            "unnamed"
        } else {
            &self.fn_name
        }
    }
}

impl std::fmt::Display for ArgumentsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            ArgumentsErrorKind::TooMany => write!(
                f,
                "Too many arguments in function {} (expected: {}, actual: {})",
                self.display_name(),
                self.index,
                self.argc
            ),
            ArgumentsErrorKind::UnexpectedType => write!(
                f,
                "Unexpected type of argument in function {} (expected: {}, actual: {}, index: {})",
                self.display_name(),
                self.expected.join(" or "),
                self.actual_type.as_deref().unwrap_or("unknown"),
                self.index
            ),
            ArgumentsErrorKind::TooFew => write!(
                f,
                "Too few arguments in function {} (expected: {}, index: {})",
                self.display_name(),
                self.expected.join(" or "),
                self.index
            ),
        }
    }
}

impl std::error::Error for ArgumentsError {}
