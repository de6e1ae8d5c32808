//! Pipeline module - the generate/verify/refine loop and verdict ranking.

mod controller;
mod ranking;

pub use controller::*;
pub use ranking::*;
