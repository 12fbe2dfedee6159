//! Analysis passes over a parsed ELF image.
//!
//! - `elf_plt`: import table from PLT relocations and undefined dynamic symbols
//! - `functions`: symbol-driven function recovery with call and string references

pub mod elf_plt;
pub mod functions;

pub use elf_plt::{ImportEntry, ImportOrigin, ImportTable};
pub use functions::{recover_functions, CallTarget, FunctionRecoverer, Region};
