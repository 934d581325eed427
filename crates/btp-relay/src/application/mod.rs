//! # Application Module
//!
//! Application services orchestrating the domain and outbound ports.

pub mod batch;
pub mod service;

pub use batch::RelayBatch;
pub use service::RelayService;
