//! Error types for layout operations.
//!
//! Only two conditions are ever surfaced to callers. Degenerate geometry is
//! recovered inside the force code, and operations naming an unknown node are
//! silent no-ops because stale UI references are expected after a reload.

use thiserror::Error;

/// Result type alias for layout operations.
pub type LayoutResult<T> = Result<T, LayoutError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    /// The snapshot could not be loaded. The previously loaded graph is kept.
    #[error("invalid graph: {reason}")]
    InvalidGraph { reason: String },

    /// A force or simulation parameter was given a value outside its domain.
    #[error("invalid value {value} for parameter {name}")]
    InvalidParameter { name: &'static str, value: f32 },
}

impl LayoutError {
    pub(crate) fn invalid_graph(reason: impl Into<String>) -> Self {
        Self::InvalidGraph {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_problem() {
        let error = LayoutError::invalid_graph("edge 0 references unknown target \"Y\"");
        assert_eq!(
            error.to_string(),
            "invalid graph: edge 0 references unknown target \"Y\""
        );

        let error = LayoutError::InvalidParameter {
            name: "velocityDecay",
            value: 1.5,
        };
        assert_eq!(error.to_string(), "invalid value 1.5 for parameter velocityDecay");
    }
}
