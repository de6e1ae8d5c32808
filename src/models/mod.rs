//! Core data models for paperforge.
//!
//! - `request`: caller input and its normalized form
//! - `candidate`: model candidates and verifier verdicts
//! - `result`: iteration log and run output
//! - `config` / `error`: ambient configuration and failure taxonomy

mod candidate;
mod config;
mod error;
mod request;
mod result;

pub use candidate::*;
pub use config::*;
pub use error::*;
pub use request::*;
pub use result::*;
