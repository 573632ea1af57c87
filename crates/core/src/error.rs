/// Errors raised while interpreting a caller's job request.
///
/// Both variants are detected before any network call is made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// A required field is absent or the field combination is invalid.
    /// The message is returned to the caller verbatim.
    #[error("{0}")]
    Validation(String),

    /// The style selector names no known workflow template.
    #[error("Unknown styleId: {0}")]
    UnknownStyle(String),
}
