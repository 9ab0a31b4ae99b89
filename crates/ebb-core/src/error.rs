use std::fmt;
use thiserror::Error as ThisError;

///
/// EngineError
///
/// Structured runtime error with a stable internal classification.
/// Every variant is a caller-correctable precondition failure; the engine
/// has no fatal category.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct EngineError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl EngineError {
    /// Construct an EngineError from its classification parts.
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
        }
    }

    /// Construct a structural invariant violation for a specific origin.
    pub(crate) fn invariant(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::InvariantViolation, origin, message)
    }

    /// Construct an unsupported-operation error for a specific origin.
    pub(crate) fn unsupported(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Unsupported, origin, message)
    }

    /// Construct a not-attached error for a specific origin.
    pub(crate) fn not_attached(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::NotAttached, origin, message)
    }

    /// Construct a not-found error for a specific origin.
    pub(crate) fn not_found(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::NotFound, origin, message)
    }

    /// Construct a conflict error for a specific origin.
    pub(crate) fn conflict(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Conflict, origin, message)
    }

    #[must_use]
    pub const fn is_invariant_violation(&self) -> bool {
        matches!(self.class, ErrorClass::InvariantViolation)
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorClass
/// Internal error taxonomy for runtime classification.
/// Not a stable API; may change without notice.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    InvariantViolation,
    Unsupported,
    NotAttached,
    NotFound,
    Conflict,
    Internal,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::InvariantViolation => "invariant_violation",
            Self::Unsupported => "unsupported",
            Self::NotAttached => "not_attached",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Internal => "internal",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Internal origin taxonomy for runtime classification.
/// Not a stable API; may change without notice.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Model,
    Key,
    Set,
    Graph,
    Composition,
    ChangeSet,
    Submit,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Model => "model",
            Self::Key => "key",
            Self::Set => "set",
            Self::Graph => "graph",
            Self::Composition => "composition",
            Self::ChangeSet => "changeset",
            Self::Submit => "submit",
        };
        write!(f, "{label}")
    }
}
