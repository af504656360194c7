//! Error types for the Anvil framework.
//!
//! Only programmer errors (malformed specs) and I/O failures are errors here.
//! Expected negative outcomes such as a missing dependency or a constraint
//! violation are reported as `bool` / `Option` / [`DispatchOutcome`].
//!
//! [`DispatchOutcome`]: crate::dispatcher::DispatchOutcome

use std::any::Any;
use std::path::PathBuf;

use thiserror::Error;

use crate::fragment::FragmentKind;

/// Boxed error returned by command bodies, guards, relays, services and tasks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A panic caught while running user code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("panicked: {0}")]
pub struct PanicError(pub String);

impl PanicError {
    /// Extracts the message of a `catch_unwind` payload.
    pub fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(message) => *message,
            Err(payload) => match payload.downcast::<&'static str>() {
                Ok(message) => (*message).to_string(),
                Err(_) => "unknown panic payload".to_string(),
            },
        };
        Self(message)
    }
}

/// A malformed argument schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// A required argument declared an `AnyOf` type chain.
    #[error("argument '{0}' is required and cannot use an OR type chain")]
    RequiredAnyOf(String),

    /// Two arguments share a name.
    #[error("duplicate argument name '{0}'")]
    DuplicateArgument(String),

    /// Two arguments share a short flag.
    #[error("duplicate short flag '-{flag}' on argument '{argument}'")]
    DuplicateShort {
        /// The repeated flag character.
        flag: char,
        /// The second argument declaring it.
        argument: String,
    },

    /// A greedy argument is followed by other arguments.
    #[error("argument '{0}' consumes the remaining input and must be last")]
    RestNotLast(String),

    /// A required argument declared a default value.
    #[error("required argument '{0}' cannot declare a default value")]
    RequiredWithDefault(String),

    /// An argument name is empty or contains whitespace.
    #[error("invalid argument name '{0}'")]
    InvalidName(String),

    /// An argument refers to a custom type nobody registered.
    #[error("argument '{argument}' uses unregistered type '{kind}'")]
    UnknownType {
        /// Argument name.
        argument: String,
        /// The unregistered type name.
        kind: String,
    },
}

/// Errors raised while composing decorators.
#[derive(Debug, Clone, Error)]
pub enum DecoratorError {
    /// The decorator does not apply to this kind of fragment.
    #[error("decorator '{decorator}' cannot be applied to a {target} fragment")]
    InvalidDecoratorTarget {
        /// Decorator label.
        decorator: &'static str,
        /// Kind of fragment it was applied to.
        target: FragmentKind,
    },

    /// The resulting argument list is malformed.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Errors raised by the fragment loader.
///
/// These never cross [`FragmentLoader::load`](crate::loader::FragmentLoader::load),
/// which logs them and returns `None`; [`scan`](crate::loader::FragmentLoader::scan)
/// reports [`LoaderError::NotFound`].
#[derive(Debug, Error)]
pub enum LoaderError {
    /// The directory or file does not exist.
    #[error("path not found: {0}")]
    NotFound(PathBuf),

    /// Reading the filesystem failed.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The manifest could not be parsed.
    #[error("invalid fragment manifest {path}: {reason}")]
    Manifest {
        /// Manifest path.
        path: PathBuf,
        /// Parse failure.
        reason: String,
    },

    /// The manifest names an entry missing from the catalog.
    #[error("{path}: no catalog entry named '{entry}'")]
    UnknownEntry {
        /// Manifest path.
        path: PathBuf,
        /// Entry name.
        entry: String,
    },

    /// The manifest kind does not match the catalog entry kind.
    #[error("{path}: manifest declares a {declared} but entry is a {actual}")]
    KindMismatch {
        /// Manifest path.
        path: PathBuf,
        /// Kind declared by the manifest.
        declared: FragmentKind,
        /// Kind of the catalog entry.
        actual: FragmentKind,
    },

    /// The manifest overrides could not be applied.
    #[error("{path}: {source}")]
    Decorator {
        /// Manifest path.
        path: PathBuf,
        /// Decorator failure.
        #[source]
        source: DecoratorError,
    },

    /// The fragment metadata failed validation.
    #[error("{path}: fragment '{name}' failed metadata validation")]
    InvalidMetadata {
        /// Manifest path.
        path: PathBuf,
        /// Offending fragment name.
        name: String,
    },
}

impl LoaderError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path.into())
        } else {
            Self::Io {
                path: path.into(),
                source,
            }
        }
    }

    pub(crate) fn manifest(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Manifest {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for loader operations.
pub type LoaderResult<T> = Result<T, LoaderError>;
