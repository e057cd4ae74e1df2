//! Error types for the validation layer

/// Errors raised while preparing a candidate for the checks
///
/// The battery turns these into critical syntax issues; they never abort a
/// run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Grammar could not be loaded into the parser
    #[error("parser initialization failed: {0}")]
    ParserInit(String),

    /// Parser returned no tree
    #[error("parse failed")]
    ParseFailed,
}
