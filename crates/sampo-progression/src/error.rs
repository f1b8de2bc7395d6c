//! Error types for the sampo-progression crate.
//!
//! Engines never fail on routine inputs. Errors are limited to invalid
//! parameters rejected at construction and decimal overflow in stamina
//! arithmetic.

/// Errors that can occur while building or driving an engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// A tunable parameter is outside its valid range.
    #[error("invalid parameter {field}: {reason}")]
    InvalidParameter {
        /// Name of the offending parameter.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// An arithmetic overflow occurred.
    #[error("arithmetic overflow: {context}")]
    ArithmeticOverflow {
        /// Description of what was being computed.
        context: String,
    },
}
