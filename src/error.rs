use std::io;
use thiserror::Error;

/// Which side of a signal's scaling range collapsed to a single value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeKind {
    Digital,
    Physical,
}

impl std::fmt::Display for RangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RangeKind::Digital => f.write_str("digital"),
            RangeKind::Physical => f.write_str("physical"),
        }
    }
}

#[derive(Debug, Error)]
pub enum EdfError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Truncated input: need {needed} bytes, only {available} available")]
    TruncatedInput { needed: usize, available: usize },

    #[error("Malformed header field '{field}' at byte {offset}: {value:?}")]
    MalformedHeader {
        field: &'static str,
        offset: usize,
        value: String,
    },

    #[error("Header declares {declared} signals but header size {header_bytes} does not match")]
    InconsistentSignalCount { declared: usize, header_bytes: usize },

    #[error("Every signal has a degenerate scaling range: {signals:?}")]
    DegenerateRange { signals: Vec<usize> },

    #[error("Signal {signal} holds {actual} samples, expected {expected}")]
    SampleCountMismatch {
        signal: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid sample rate {rate} Hz for signal {signal}")]
    InvalidSampleRate { signal: usize, rate: f64 },

    #[error("Inverted physical range for signal {signal}: min {min} >= max {max}")]
    InvertedRange { signal: usize, min: f64, max: f64 },

    #[error("{what} index {index} out of range (len {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("Invalid value for field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Invalid data record duration: {0}")]
    InvalidRecordDuration(f64),
}

pub type Result<T> = std::result::Result<T, EdfError>;
