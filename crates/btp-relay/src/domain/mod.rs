//! # Domain Module
//!
//! Core domain types for relay message construction.

pub mod address;
pub mod entities;
pub mod errors;
pub mod invariants;
pub mod value_objects;

pub use address::*;
pub use entities::*;
pub use errors::*;
pub use invariants::*;
pub use value_objects::*;
