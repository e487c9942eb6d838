use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

use crate::{atomic, Atomic};

/// Error kinds for quarry operations.
///
/// Each kind describes one category of failure in the condition algebra or
/// the query set-algebra, enabling precise error handling by the consumer.
///
/// # Examples
///
/// ```rust,ignore
/// use quarry::errors::{QuarryError, ErrorKind, QuarryResult};
///
/// fn example() -> QuarryResult<()> {
///     Err(QuarryError::new("unknown field", ErrorKind::InvalidFieldName))
/// }
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    /// Malformed condition tree construction (wrong operand shape, second
    /// operand on a NOT, non-operation append target)
    ConditionError,
    /// A raw value could not be coerced into the subject's type
    TypecastError,
    /// Generic validation error
    ValidationError,
    /// The named field or relationship does not exist on the model
    InvalidFieldName,
    /// Invalid data type for an operation
    InvalidDataType,
    /// The operation is not valid in the current context
    InvalidOperation,
    /// Two queries over different models were combined
    ModelMismatch,
    /// A computed offset/limit pair is outside the addressable window
    RangeError,
    /// Internal error (usually indicates a bug)
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::ConditionError => write!(f, "Condition error"),
            ErrorKind::TypecastError => write!(f, "Typecast error"),
            ErrorKind::ValidationError => write!(f, "Validation error"),
            ErrorKind::InvalidFieldName => write!(f, "Invalid field name"),
            ErrorKind::InvalidDataType => write!(f, "Invalid data type"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::ModelMismatch => write!(f, "Model mismatch"),
            ErrorKind::RangeError => write!(f, "Range error"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Custom quarry error type.
///
/// `QuarryError` encapsulates the error message, kind, and optional cause.
/// It supports error chaining and backtraces for debugging.
///
/// # Examples
///
/// ```rust,ignore
/// use quarry::errors::{QuarryError, ErrorKind};
///
/// // Create a simple error
/// let err = QuarryError::new("typecast failed", ErrorKind::TypecastError);
///
/// // Create an error with a cause
/// let cause = QuarryError::new("not a number", ErrorKind::InvalidDataType);
/// let err = QuarryError::new_with_cause("typecast failed", ErrorKind::TypecastError, cause);
/// ```
///
/// # Type alias
///
/// The `QuarryResult<T>` type alias is equivalent to `Result<T, QuarryError>`
/// and is used throughout the codebase for operations that can fail.
#[derive(Clone)]
pub struct QuarryError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<QuarryError>>,
    backtrace: Atomic<Backtrace>,
}

impl QuarryError {
    /// Creates a new `QuarryError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        QuarryError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: atomic(Backtrace::new()),
        }
    }

    /// Creates a new `QuarryError` with a cause error.
    ///
    /// This creates an error chain where the cause error is preserved for
    /// debugging.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: QuarryError) -> Self {
        QuarryError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: atomic(Backtrace::new()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&Box<QuarryError>> {
        self.cause.as_ref()
    }
}

impl Display for QuarryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for QuarryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // print error message with stack trace followed by cause
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => write!(f, "{}\n{:?}", self.message, self.backtrace.read()),
        }
    }
}

impl Error for QuarryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for quarry operations.
///
/// `QuarryResult<T>` is shorthand for `Result<T, QuarryError>`.
/// All fallible quarry operations return this type.
pub type QuarryResult<T> = Result<T, QuarryError>;

// From trait implementations for automatic error conversion
impl From<std::num::ParseIntError> for QuarryError {
    fn from(err: std::num::ParseIntError) -> Self {
        QuarryError::new(
            &format!("Integer parsing error: {}", err),
            ErrorKind::InvalidDataType,
        )
    }
}

impl From<std::num::ParseFloatError> for QuarryError {
    fn from(err: std::num::ParseFloatError) -> Self {
        QuarryError::new(
            &format!("Float parsing error: {}", err),
            ErrorKind::InvalidDataType,
        )
    }
}

impl From<std::fmt::Error> for QuarryError {
    fn from(err: std::fmt::Error) -> Self {
        QuarryError::new(
            &format!("Formatting error: {}", err),
            ErrorKind::InternalError,
        )
    }
}

impl From<String> for QuarryError {
    fn from(msg: String) -> Self {
        QuarryError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for QuarryError {
    fn from(msg: &str) -> Self {
        QuarryError::new(msg, ErrorKind::InternalError)
    }
}
