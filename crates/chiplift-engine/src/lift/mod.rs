//! ROM-to-IR lifting

pub mod lifter;
pub mod ranges;
pub mod state;

pub use lifter::{lift_program, LiftReport};
pub use ranges::{CodeRanges, RangeParseError};
