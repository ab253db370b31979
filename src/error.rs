//! Typed errors for configuration, instance parsing, and the optional ILP
//! back-end. The B&B engine itself has no fallible operations once
//! constructed (internal invariant breaches are programmer errors and are
//! asserted, not returned -- see `allocator::Allocator`).

/// Errors raised while parsing a config file (general parameters and
/// `Allocator{ ... }` blocks).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown general parameter key: '{0}'")]
    UnknownGeneralKey(String),

    #[error("unknown allocator parameter key: '{0}'")]
    UnknownAllocatorKey(String),

    #[error("unterminated 'Allocator{{' block (missing closing '}}')")]
    UnterminatedBlock,

    #[error("missing required general parameter: '{0}'")]
    MissingGeneralKey(&'static str),

    #[error("invalid integer value for '{key}': '{value}'")]
    InvalidInt { key: String, value: String },

    #[error("invalid float value for '{key}': '{value}'")]
    InvalidFloat { key: String, value: String },

    #[error("invalid sort method for '{key}': '{value}' (expected none|lexicographic|maximum|sum)")]
    InvalidSortMethod { key: String, value: String },

    #[error("invalid boolean value for '{key}': '{value}' (expected true|false)")]
    InvalidBool { key: String, value: String },

    #[error("no parameter sets defined (no 'Allocator{{' block found)")]
    NoParamSets,

    #[error("invalid allocator parameters: {0}")]
    Param(#[from] ParamError),

    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by `AllocatorParams` validation at construction time.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ParamError {
    #[error("boundThreshold must be in (0, 1], got {0}")]
    BoundThresholdOutOfRange(f64),

    #[error("maxMigrationsRatio must be positive, got {0}")]
    ZeroMigrationsRatio(i64),

    #[error("parameter set name must not be empty")]
    EmptyName,

    #[error("timeout must be non-negative, got {0}")]
    NegativeTimeout(f64),
}

/// Errors raised while parsing a plain-text problem instance file.
#[derive(Debug, thiserror::Error)]
pub enum InstanceError {
    #[error("missing header line '<numVMs> <numPMs>'")]
    MissingHeader,

    #[error("malformed header line: '{0}'")]
    MalformedHeader(String),

    #[error("expected {expected} VM lines, found {found}")]
    WrongVmCount { expected: usize, found: usize },

    #[error("expected {expected} PM lines, found {found}")]
    WrongPmCount { expected: usize, found: usize },

    #[error("VM line {line} has {found} fields, expected {expected} (dimension + initial PM)")]
    WrongVmFieldCount {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("PM line {line} has {found} fields, expected {expected} (dimension)")]
    WrongPmFieldCount {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("non-numeric field '{0}' in instance file")]
    NonNumericField(String),

    #[error("failed to read instance file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by the optional external-ILP-solver shell-out.
#[cfg(feature = "ilp")]
#[derive(Debug, thiserror::Error)]
pub enum IlpError {
    #[error("failed to spawn solver binary '{binary}': {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("solver exited with non-zero status: {0}")]
    NonZeroExit(std::process::ExitStatus),

    #[error("could not find objective-value sentinel line in solver output")]
    MissingSentinel,

    #[error("could not parse objective value from sentinel line: '{0}'")]
    UnparsableObjective(String),

    #[error("failed to write LP file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
