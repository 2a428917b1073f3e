//! Full query answers, the payload of the query layer.

use serde::{Deserialize, Serialize};

/// Answer plus the context it was generated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryAnswer {
    /// Generated answer text.
    pub answer: Box<str>,
    /// Context passed to the generator (already truncated).
    pub context: Box<str>,
}
