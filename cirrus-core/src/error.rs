//! Error taxonomy shared by the identifier codecs and the convergence engine
//!
//! Every failure is returned as a value so that resource handlers can decide
//! whether to drop the managed object, retry at a higher level, or report.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::retry::Verdict;

/// Boxed error produced by an external collaborator (transport, reader)
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Which half of a composite identifier failed to parse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Half {
    Primary,
    Secondary,
}

impl fmt::Display for Half {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Half::Primary => write!(f, "primary"),
            Half::Secondary => write!(f, "secondary"),
        }
    }
}

/// Errors raised while parsing or constructing resource identifiers
///
/// These are always fatal: an identifier that does not parse is invalid input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The identifier does not start with `/`
    #[error("resource ID must be an absolute path starting with '/', got {0:?}")]
    NotAbsolute(String),

    /// A marker expected by the format is absent, misspelt, or has an empty value
    #[error("resource ID is missing the segment {0:?}")]
    MissingSegment(String),

    /// A fixed-value segment (such as the provider namespace) has a different value
    #[error("segment {segment:?} should be {expected:?} but was {actual:?}")]
    UnexpectedValue {
        segment: String,
        expected: String,
        actual: String,
    },

    /// A segment value contains a character reserved for composite identifiers
    #[error("segment {segment:?} contains the reserved character {character:?}")]
    InvalidCharacter { segment: String, character: char },

    /// Path components remain after every expected segment was consumed
    #[error("resource ID has unexpected trailing segments {0:?}")]
    TrailingSegments(String),

    /// A composite identifier does not contain its separator
    #[error("composite ID {input:?} does not contain the separator {separator:?}")]
    SeparatorNotFound { input: String, separator: String },

    /// Splitting a composite identifier did not give two non-empty halves
    #[error("composite ID {0:?} must contain exactly two non-empty identifiers")]
    MalformedComposite(String),

    /// One half of a composite identifier failed to parse
    #[error("parsing the {half} ID of composite ID: {source}")]
    InHalf {
        half: Half,
        #[source]
        source: Box<ParseError>,
    },
}

impl ParseError {
    pub(crate) fn missing(segment: impl Into<String>) -> Self {
        Self::MissingSegment(segment.into())
    }

    pub(crate) fn in_half(half: Half, source: ParseError) -> Self {
        Self::InHalf {
            half,
            source: Box::new(source),
        }
    }
}

/// Failure detail reported by the provider for a finished operation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProviderFailure {
    pub code: Option<String>,
    pub message: String,
}

impl ProviderFailure {
    pub fn new(code: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            code: code.map(str::to_string),
            message: message.into(),
        }
    }
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "Code={:?} Message={:?}", code, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Errors raised while driving an operation or waiting for convergence
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The provider reported that the mutation failed
    #[error("operation failed: {0}")]
    ProviderFailure(ProviderFailure),

    /// The provider reported that the operation was canceled
    #[error("operation was canceled by the provider")]
    Canceled,

    /// A transport error the retry classifier did not consider transient
    #[error("{verdict:?} transport error: {source}")]
    Transport {
        verdict: Verdict,
        #[source]
        source: BoxError,
    },

    /// A convergence read returned a status outside the pending and target sets
    #[error("unexpected state {status:?}, wanted target {target:?} (pending: {pending:?})")]
    DivergedState {
        status: String,
        target: String,
        pending: Vec<String>,
    },

    /// Reading the resource during a convergence wait failed
    #[error("reading resource status: {0}")]
    ReadFailed(#[source] BoxError),

    /// The deadline passed while the operation was still converging
    #[error("timeout while waiting for {operation} after {elapsed:?}{}", last_error_suffix(.last_error))]
    DeadlineExceeded {
        operation: String,
        elapsed: Duration,
        last_error: Option<String>,
    },
}

fn last_error_suffix(last_error: &Option<String>) -> String {
    match last_error {
        Some(e) => format!(" (last error: {})", e),
        None => String::new(),
    }
}

impl Error {
    /// True when the operation may still be in progress on the provider side
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, Error::DeadlineExceeded { .. })
    }

    pub fn transport(verdict: Verdict, source: impl Into<BoxError>) -> Self {
        Self::Transport {
            verdict,
            source: source.into(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
