//! Application error type.
//!
//! Every failure in the pipeline is an `AppError`: a typed [`ErrorKind`] plus a
//! message that names the offending plate or group. The kind decides the
//! process exit code so scripts can tell bad parameters apart from bad data.

/// Classification of pipeline failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid run parameters (cutoff, locality, paths).
    Configuration,
    /// A requested curve-fit algorithm is not registered.
    UnsupportedModel,
    /// File could not be opened, read or written.
    Io,
    /// A required group (e.g. a plate's controls) has zero usable rows.
    EmptyInput,
    /// A drug group has no matching control group.
    EmptyGroup,
    /// Too few distinct concentrations to fit a curve.
    InsufficientData,
    /// Input violates the data model (bad numbers, zero concentration, ...).
    InvalidData,
    /// A computation produced a non-finite result.
    Numerical,
}

impl ErrorKind {
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::Configuration | ErrorKind::UnsupportedModel | ErrorKind::Io => 2,
            ErrorKind::EmptyInput
            | ErrorKind::EmptyGroup
            | ErrorKind::InsufficientData
            | ErrorKind::InvalidData => 3,
            ErrorKind::Numerical => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration error",
            ErrorKind::UnsupportedModel => "unsupported model",
            ErrorKind::Io => "i/o error",
            ErrorKind::EmptyInput => "empty input",
            ErrorKind::EmptyGroup => "empty group",
            ErrorKind::InsufficientData => "insufficient data",
            ErrorKind::InvalidData => "invalid data",
            ErrorKind::Numerical => "numerical error",
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    kind: ErrorKind,
    message: String,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    pub fn unsupported_model(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnsupportedModel, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    pub fn empty_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::EmptyInput, message)
    }

    pub fn empty_group(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::EmptyGroup, message)
    }

    pub fn insufficient_data(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InsufficientData, message)
    }

    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidData, message)
    }

    pub fn numerical(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Numerical, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn exit_code(&self) -> u8 {
        self.kind.exit_code()
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.label(), self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
