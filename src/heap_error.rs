use std::fmt;

pub type Result<T> = std::result::Result<T, HeapError>;

/// Express where a fatal problem came from.
#[derive(Debug, PartialEq, Eq)]
pub enum ErrorLayer {
    /// The invocation itself is unusable, like a heap file that can't be
    /// opened or an output file that can't be written.
    BadInput,
    /// The heap dump is malformed in a way we can't recover from, like an
    /// unknown line in the roots section.
    DataLayer,
}

/// HeapError payload describing what went wrong.
#[derive(Debug)]
pub struct ErrorDetails {
    pub layer: ErrorLayer,
    /// Human readable description, already naming the offending file or line.
    pub message: String,
}

/// Problems that end the run.
///
/// Only fatal problems are errors.  Recoverable oddities in the graph body are
/// collected as `SkippedLine`s by the parser, an empty target selection is a
/// normal (if negative) outcome, and unreachable targets are simply not
/// printed.
#[derive(Debug)]
pub enum HeapError {
    Fatal(ErrorDetails),
}

impl HeapError {
    pub fn fatal(layer: ErrorLayer, message: String) -> HeapError {
        HeapError::Fatal(ErrorDetails { layer, message })
    }

    pub fn details(&self) -> &ErrorDetails {
        match self {
            HeapError::Fatal(details) => details,
        }
    }
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error: {}", self.details().message)
    }
}

impl std::error::Error for HeapError {}

// I/O failures while reading or writing a heap file are never worth retrying.
impl From<std::io::Error> for HeapError {
    fn from(err: std::io::Error) -> HeapError {
        HeapError::fatal(ErrorLayer::BadInput, err.to_string())
    }
}
