//! Domain error types.

/// Failure to turn a strategy expression into a rule tree.
///
/// Variants that can be pinned to a character offset carry a `position` so
/// the CLI can point at the offending input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("parse error at position {position}: {message}")]
    Parse { message: String, position: usize },

    #[error("unknown function '{name}' at position {position}")]
    UnknownFunction { name: String, position: usize },

    #[error("{name} expects {expected} argument(s), found {found}")]
    BadArity {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("{name}: argument {index} must be {expected}")]
    BadType {
        name: String,
        index: usize,
        expected: &'static str,
    },

    #[error("{name}: {reason}")]
    BadDomain { name: String, reason: String },

    #[error("mismatched parentheses at position {position}")]
    MismatchedParens { position: usize },

    #[error("malformed expression: {reason}")]
    MalformedExpression { reason: String },
}

impl CompileError {
    pub fn position(&self) -> Option<usize> {
        match self {
            CompileError::Parse { position, .. }
            | CompileError::UnknownFunction { position, .. }
            | CompileError::MismatchedParens { position } => Some(*position),
            _ => None,
        }
    }

    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        match self.position() {
            Some(position) => {
                let caret = " ".repeat(position) + "^";
                format!("{input}\n{caret}\n{err}", input = input, caret = caret, err = self)
            }
            None => format!("{input}\n{err}", input = input, err = self),
        }
    }
}

/// Top-level error type for samalert.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("unknown symbol {symbol}")]
    UnknownSymbol { symbol: String },

    #[error("reference count for {symbol} released below zero")]
    OverRelease { symbol: String },

    #[error("storage error: {reason}")]
    Storage { reason: String },

    #[error("storage query error: {reason}")]
    StorageQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid data: {reason}")]
    InvalidData { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&EngineError> for std::process::ExitCode {
    fn from(err: &EngineError) -> Self {
        let code: u8 = match err {
            EngineError::Io(_) => 1,
            EngineError::ConfigParse { .. }
            | EngineError::ConfigMissing { .. }
            | EngineError::ConfigInvalid { .. } => 2,
            EngineError::Storage { .. } | EngineError::StorageQuery { .. } => 3,
            EngineError::Compile(_) => 4,
            EngineError::InvalidData { .. } | EngineError::UnknownSymbol { .. } => 5,
            EngineError::OverRelease { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
