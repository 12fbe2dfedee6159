//! Disassembly engines and registry.
//!
//! Both adapters decode x86 and x86-64 only:
//! - iced-x86 (default)
//! - capstone (alternative, selected through configuration)

pub mod capstone;
pub mod iced;
pub mod registry;

pub use registry::{for_arch, for_arch_with, Backend, BackendKind};
