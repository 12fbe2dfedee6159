use revgraph::analysis::{ImportOrigin, ImportTable};
use revgraph::config::ExtractionConfig;
use revgraph::extract_bytes;
use revgraph::formats::elf::ElfParser;
use revgraph::symbols::SymbolMap;

use crate::common::*;

fn rela_entries(symbol_indices: &[u64]) -> Vec<u8> {
    let mut out = Vec::new();
    for (i, &sym) in symbol_indices.iter().enumerate() {
        out.extend_from_slice(&(0x404018 + 8 * i as u64).to_le_bytes());
        out.extend_from_slice(&((sym << 32) | R_X86_64_JUMP_SLOT as u64).to_le_bytes());
        out.extend_from_slice(&0i64.to_le_bytes());
    }
    out
}

/// Dynamic image with `.plt` of `plt_size` bytes and one relocation per entry of `relocs`
fn dynamic_elf(plt_size: usize, dynsyms: &[&str], relocs: &[u64], plt_sec: Option<usize>) -> Vec<u8> {
    let syms: Vec<_> = dynsyms.iter().map(|n| SymbolDef::undefined_func(n)).collect();
    let mut builder = ElfBuilder::new()
        .section(SectionDef::new(
            ".text",
            SHT_PROGBITS,
            SHF_ALLOC | SHF_EXECINSTR,
            TEXT_ADDR,
            hello_text(),
        ))
        .section(SectionDef::new(
            ".plt",
            SHT_PROGBITS,
            SHF_ALLOC | SHF_EXECINSTR,
            PLT_ADDR,
            vec![0xcc; plt_size],
        ));
    if let Some(size) = plt_sec {
        builder = builder.section(SectionDef::new(
            ".plt.sec",
            SHT_PROGBITS,
            SHF_ALLOC | SHF_EXECINSTR,
            0x402100,
            vec![0xcc; size],
        ));
    }
    builder
        .symbols(".dynsym", ".dynstr", SHT_DYNSYM, &syms)
        .section(
            SectionDef::new(".rela.plt", SHT_RELA, SHF_ALLOC, 0, rela_entries(relocs))
                .link(".dynsym")
                .entsize(24),
        )
        .build()
}

#[test]
fn test_ordinal_mapping_with_library_attribution() {
    let bytes = hello_elf();
    let parser = ElfParser::parse(&bytes).unwrap();
    let table = ImportTable::from_elf(&parser, 16).unwrap();

    assert_eq!(table.len(), 2);
    let printf = table.lookup(PRINTF_STUB).unwrap();
    assert_eq!(printf.name, "printf");
    assert_eq!(printf.origin, ImportOrigin::PltRelocation { ordinal: 0 });
    assert_eq!(printf.library.as_deref(), Some("libc.so.6"));

    let puts = table.by_name("puts").unwrap();
    assert_eq!(puts.address, 0);
    assert_eq!(puts.origin, ImportOrigin::UndefinedSymbol);
    assert_eq!(puts.library.as_deref(), Some("libc.so.6"));

    assert!(table.in_stub_region(PLT_ADDR));
    assert!(!table.in_stub_region(PLT_ADDR + 32));
}

#[test]
fn test_relocation_and_fallback_addresses_never_collide() {
    let bytes = dynamic_elf(64, &["a", "b", "c", "d"], &[1, 2, 3], None);
    let parser = ElfParser::parse(&bytes).unwrap();
    let table = ImportTable::from_elf(&parser, 16).unwrap();

    let stubs: Vec<_> = table.entries().iter().map(|e| (e.name.as_str(), e.address)).collect();
    assert_eq!(
        stubs,
        vec![("a", 0x402000), ("b", 0x402010), ("c", 0x402020), ("d", 0)]
    );
    for entry in table.entries() {
        match entry.origin {
            ImportOrigin::PltRelocation { .. } => assert_ne!(entry.address, 0),
            ImportOrigin::UndefinedSymbol => assert_eq!(entry.address, 0),
        }
        assert!(entry.library.is_none());
    }
}

#[test]
fn test_stubs_past_plt_end_are_dropped() {
    let bytes = dynamic_elf(32, &["a", "b", "c"], &[1, 2, 3], None);
    let parser = ElfParser::parse(&bytes).unwrap();
    let table = ImportTable::from_elf(&parser, 16).unwrap();

    assert_eq!(table.by_name("a").unwrap().address, 0x402000);
    assert!(table.lookup(0x402010).is_none());
    assert_eq!(table.by_name("b").unwrap().origin, ImportOrigin::UndefinedSymbol);
    assert_eq!(table.by_name("c").unwrap().address, 0);
}

#[test]
fn test_plt_sec_aliases_resolve_to_same_import() {
    let bytes = dynamic_elf(48, &["printf", "exit"], &[1, 2], Some(32));
    let parser = ElfParser::parse(&bytes).unwrap();
    let table = ImportTable::from_elf(&parser, 16).unwrap();

    assert_eq!(table.len(), 2);
    assert_eq!(table.lookup(0x402100).unwrap().name, "printf");
    assert_eq!(table.lookup(0x402110).unwrap().name, "exit");
    assert_eq!(table.lookup(0x402110).unwrap().address, 0x402010);
    assert!(table.in_stub_region(0x40211f));
}

#[test]
fn test_larger_stride_moves_stubs() {
    let bytes = dynamic_elf(64, &["a"], &[1], None);
    let parser = ElfParser::parse(&bytes).unwrap();
    let table = ImportTable::from_elf(&parser, 32).unwrap();
    assert_eq!(table.by_name("a").unwrap().address, PLT_ADDR + 32);
}

#[test]
fn test_missing_dynsym_gives_empty_table() {
    let bytes = hello_static_elf();
    let parser = ElfParser::parse(&bytes).unwrap();
    let table = ImportTable::from_elf(&parser, 16).unwrap();
    assert!(table.is_empty());
}

#[test]
fn test_plt_symbol_names_become_imports() {
    let mut symbols = vec![
        SymbolDef::func("main", MAIN_ADDR, 20),
        SymbolDef::func("printf@plt", PRINTF_STUB, 16)
            .with_kind(STT_NOTYPE, STB_GLOBAL)
            .in_section(Some(".plt")),
    ];
    symbols.push(SymbolDef::func("compute", COMPUTE_ADDR, 6));
    let bytes = hello_static_builder()
        .symbols(".symtab", ".strtab", SHT_SYMTAB, &symbols)
        .build();

    let artifact = extract_bytes("plt-names", &bytes, &ExtractionConfig::default()).unwrap();
    assert!(artifact.imports().is_empty());
    let main = artifact.function_at(MAIN_ADDR).unwrap();
    assert_eq!(main.imports().len(), 1);
    assert_eq!(main.imports()[0].name(), "printf");
    assert_eq!(main.imports()[0].address(), PRINTF_STUB);
    assert!(main.callees().is_empty());
}

#[test]
fn test_symbol_map_merges_static_and_dynamic() {
    let bytes = hello_elf();
    let parser = ElfParser::parse(&bytes).unwrap();
    let map = SymbolMap::from_elf(&parser).unwrap();

    assert_eq!(map.name_at(MAIN_ADDR), Some("main"));
    assert_eq!(map.address_of("compute"), Some(COMPUTE_ADDR));
    // Undefined dynamic symbols and the file symbol sit at address 0
    assert!(map.address_of("printf").is_none());
    assert!(map.address_of("hello.c").is_none());
    let functions: Vec<_> = map.functions().map(|r| r.name.as_str()).collect();
    assert_eq!(functions, vec!["main", "_start", "compute"]);
}
