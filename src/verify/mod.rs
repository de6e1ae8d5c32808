//! Verification module.
//!
//! Provides:
//! - `Verifier`: the external verifier seam
//! - `VerificationAdapter`: calls it with a candidate's overrides
//! - `CommandVerifier`: runs a verifier process over stdin/stdout

mod adapter;
mod command;

pub use adapter::*;
pub use command::*;
