//! Error types for backchat-types.

use thiserror::Error;

/// A channel identifier string that is not in `"{type}:{id}"` form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed cid (expected \"type:id\"): {value}")]
pub struct CidParseError {
    /// The rejected input.
    pub value: String,
}

impl CidParseError {
    pub(crate) fn new(value: &str) -> Self {
        Self {
            value: value.to_string(),
        }
    }
}

/// Errors raised while decoding a wire event payload.
///
/// A malformed event is dropped by the consumer; it never aborts event
/// processing.
#[derive(Debug, Error)]
pub enum EventParseError {
    /// Payload is not valid JSON or does not match any event shape.
    #[error("malformed event payload: {0}")]
    Malformed(#[source] serde_json::Error),

    /// Payload is valid JSON but carries an unrecognized event type.
    #[error("unknown event type: {0}")]
    UnknownType(String),
}
