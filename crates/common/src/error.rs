use thiserror::Error;

/// Canonical FFQ error taxonomy used across the translator crates.
///
/// Classification guidance:
/// - [`FfqError::Structural`]: malformed tree shape discovered while converting
/// - [`FfqError::Unsupported`]: recognized constructs that are intentionally unimplemented
/// - [`FfqError::FunctionLookup`]: a signature miss the caller treats as fatal
/// - [`FfqError::CatalogLoad`]: a whole catalog source could not be decoded
/// - [`FfqError::InvalidConfig`]: converter configuration contract violations
/// - [`FfqError::Io`]: raw filesystem failures from std APIs
///
/// Every variant aborts the conversion call that produced it; no partial
/// output tree is ever returned next to an error.
#[derive(Debug, Error)]
pub enum FfqError {
    /// Malformed plan or expression shape.
    ///
    /// Examples:
    /// - missing required input relation or expression payload
    /// - field index outside the evaluation schema
    /// - literal row count that does not divide the column count
    /// - plan deeper than the configured maximum
    #[error("structural error: {0}")]
    Structural(String),

    /// Valid request for a construct not implemented by the translator.
    ///
    /// Examples:
    /// - join kinds outside the supported subset
    /// - unspecified sort directions or aggregation phases
    /// - type extensions other than the `unknown` placeholder
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Function reference that could not be resolved.
    #[error("function lookup failed: {0}")]
    FunctionLookup(String),

    /// A catalog source that cannot be decoded at all.
    #[error("catalog load error: {0}")]
    CatalogLoad(String),

    /// Invalid converter configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Transparent std IO failures.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Standard FFQ result alias.
pub type Result<T> = std::result::Result<T, FfqError>;
