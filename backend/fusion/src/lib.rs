pub mod engine;
pub mod overrides;

pub use engine::{
    adjust_invoice_confidence, FusionConfig, FusionEngine, DEFAULT_SINGLE_MATCH_BOOST,
    DEFAULT_THRESHOLD,
};
pub use overrides::OperatorOverrides;
