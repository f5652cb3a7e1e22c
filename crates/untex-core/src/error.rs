//! Error type shared by the recognition and generation paths.

use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors that propagate to the driver. A recognition dead-end is not an
/// error: it is the [`crate::UntexOutcome::Unmatched`] variant of the
/// driver's result.
#[derive(Debug)]
pub enum Error {
    /// File access failed, including a missing required database file.
    Io {
        context: String,
        source: std::io::Error,
    },
    /// Malformed database record or text-encoded bitmap.
    Parse(String),
    /// The external renderer exited unsuccessfully.
    Render(String),
    /// The generator's blank crop bands around a rendered job are absent.
    SpacingInvariantViolated,
}

impl Error {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { context, source } => write!(f, "{}: {}", context, source),
            Self::Parse(message) => write!(f, "parse error: {}", message),
            Self::Render(message) => write!(f, "renderer failed: {}", message),
            Self::SpacingInvariantViolated => {
                write!(f, "rendered symbol is missing its surrounding blank bands")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
