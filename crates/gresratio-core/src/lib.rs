//! gresratio-core: Core types for the CPU/GPU ratio admission policy
//!
//! This crate provides the pieces that have no side effects beyond reading
//! the policy file:
//! - Policy model and the policy file parser
//! - GRES descriptor parsing
//! - Admission requests and decisions
//! - Host settings
//! - Error handling

pub mod config;
pub mod decision;
pub mod descriptor;
pub mod error;
pub mod parser;
pub mod policy;
pub mod reader;
pub mod request;

pub use config::*;
pub use decision::*;
pub use descriptor::*;
pub use error::*;
pub use parser::*;
pub use policy::*;
pub use reader::*;
pub use request::*;
