//! C7's accumulator/schema/confidence-filter logic and C10's fix-safety
//! validator.

pub mod accumulator;
pub mod fix_safety;
pub mod schema;

pub use accumulator::{parse_and_filter, AccumulatorError, DeltaAccumulator};
pub use fix_safety::{sensitive, validate_fix};
