//! String extraction from data sections.
//!
//! Each configured section is scanned for printable runs; records are
//! addressed at the section's load address plus the run offset. Missing
//! sections are skipped.

pub mod scan;

use tracing::debug;

use crate::core::artifact::StringReference;
use crate::formats::elf::ElfParser;

pub use scan::scan_printable;

/// Scan `section_names` (in order) for printable runs of at least `min_length` bytes
pub fn scan_sections(
    parser: &ElfParser<'_>,
    section_names: &[String],
    min_length: usize,
) -> Vec<StringReference> {
    let mut out = Vec::new();
    for name in section_names {
        let Some(section) = parser.section(name) else {
            debug!(section = %name, "string section not present");
            continue;
        };
        let base = section.addr();
        for (text, offset) in scan_printable(section.data, min_length) {
            match base.checked_add(offset as u64) {
                Some(address) => out.push(StringReference::new(text, address)),
                None => debug!(section = %name, base, offset, "string address overflows, skipped"),
            }
        }
    }
    out
}
