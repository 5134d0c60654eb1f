use std::fmt;

#[derive(Debug)]
pub enum PrefsError {
    /// File read/write/rename error.
    Io(String),
    /// Malformed markup or flat-text input.
    Parse(String),
    /// A node exists but cannot be decoded into the target type, or a
    /// required field is missing.
    Decode(String),
    /// Version number outside the known migration range.
    UnknownVersion(u32),
}

impl PrefsError {
    pub(crate) fn io(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }

    pub(crate) fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }
}

impl fmt::Display for PrefsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "IO error: {msg}"),
            Self::Parse(msg) => write!(f, "parse error: {msg}"),
            Self::Decode(msg) => write!(f, "decode error: {msg}"),
            Self::UnknownVersion(v) => write!(f, "unknown schema version {v}"),
        }
    }
}

impl std::error::Error for PrefsError {}
