//! Core data types for revgraph.
//!
//! The artifact tree produced by extraction, the decoded instruction model and
//! the decoder trait shared by the disassembly backends.

pub mod artifact;
pub mod disassembler;
pub mod instruction;
