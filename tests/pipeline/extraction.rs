use revgraph::config::ExtractionConfig;
use revgraph::core::artifact::FileKind;
use revgraph::core::disassembler::{Architecture, Endianness};
use revgraph::hashing::sha256_digest;
use revgraph::{extract_bytes, load_binaries, load_binary, BinaryArtifact, RevgraphConfig};

use crate::common::test_utils::{create_temp_file, write_named};
use crate::common::*;

fn extract_hello() -> BinaryArtifact {
    let dir = tempfile::tempdir().unwrap();
    let path = write_named(&dir, "hello.elf", &hello_elf());
    load_binary(&path).expect("reference program extracts")
}

#[test]
fn test_header_fields_and_identity() {
    let bytes = hello_elf();
    let artifact = extract_hello();

    assert_eq!(artifact.name(), "hello");
    assert_eq!(artifact.content_hash(), sha256_digest(&bytes));
    assert_eq!(artifact.architecture(), Architecture::X86_64);
    assert_eq!(artifact.endianness(), Endianness::Little);
    assert_eq!(artifact.word_size(), 64);
    assert_eq!(artifact.file_kind(), FileKind::Executable);
    assert_eq!(artifact.entry_point(), TEXT_ADDR);
    assert!(artifact.validate().is_empty(), "{:?}", artifact.validate());
}

#[test]
fn test_functions_skip_startup_code() {
    let artifact = extract_hello();
    let names: Vec<_> = artifact.functions().iter().map(|f| f.name()).collect();
    assert_eq!(names, vec!["main", "compute"]);

    for func in artifact.functions() {
        assert_eq!(func.blocks().len(), 1);
        assert_eq!(func.blocks()[0].address(), func.address());
        assert!(func.blocks()[0].successors().is_empty());
    }
}

#[test]
fn test_main_references_printf_and_banner() {
    let artifact = extract_hello();
    let main = artifact.function_at(MAIN_ADDR).unwrap();

    assert_eq!(main.size(), 20);
    assert_eq!(main.imports().len(), 1);
    let printf = &main.imports()[0];
    assert_eq!(printf.name(), "printf");
    assert_eq!(printf.address(), PRINTF_STUB);
    assert_eq!(printf.library(), Some("libc.so.6"));
    assert!(main.callees().is_empty());

    assert_eq!(main.strings().len(), 1);
    assert_eq!(main.strings()[0].value(), "Hello, world");
    assert_eq!(main.strings()[0].address(), RODATA_ADDR);

    let mnemonics: Vec<_> = main.instructions().map(|i| i.mnemonic()).collect();
    assert_eq!(&mnemonics[..3], &["lea", "call", "ret"]);
    assert_eq!(mnemonics.len(), 10);
    assert_eq!(main.instructions().nth(1).unwrap().opcode_hex(), "e8f40f0000");
}

#[test]
fn test_local_calls_are_raw_callees() {
    let artifact = extract_hello();
    let compute = artifact.function_at(COMPUTE_ADDR).unwrap();
    assert_eq!(compute.callees(), &[MAIN_ADDR]);
    assert!(compute.imports().is_empty());
    assert!(compute.strings().is_empty());
}

#[test]
fn test_binary_level_strings_and_imports() {
    let artifact = extract_hello();

    let strings: Vec<_> = artifact
        .strings()
        .iter()
        .map(|s| (s.value(), s.address()))
        .collect();
    assert_eq!(
        strings,
        vec![
            ("Hello, world", RODATA_ADDR),
            ("usage: hello", RODATA_ADDR + 15),
            ("config.ini", DATA_ADDR + 4),
        ]
    );

    let imports: Vec<_> = artifact
        .imports()
        .iter()
        .map(|i| (i.name(), i.address()))
        .collect();
    assert_eq!(imports, vec![("printf", PRINTF_STUB), ("puts", 0)]);
}

#[test]
fn test_static_binary_has_no_imports() {
    let artifact = extract_bytes("static", &hello_static_elf(), &Default::default()).unwrap();
    assert!(artifact.imports().is_empty());

    let main = artifact.function_at(MAIN_ADDR).unwrap();
    assert!(main.imports().is_empty());
    assert_eq!(main.callees(), &[PRINTF_STUB]);
    assert!(artifact.validate().is_empty());
}

#[test]
fn test_unsupported_machine_still_yields_artifact() {
    let bytes = hello_static_builder().machine(183).build();
    let artifact = extract_bytes("arm", &bytes, &Default::default()).unwrap();
    assert_eq!(artifact.architecture(), Architecture::ARM64);
    assert!(artifact.functions().is_empty());
    assert_eq!(artifact.strings().len(), 3);
}

#[test]
fn test_string_addresses_past_address_space_are_dropped() {
    let high = u64::MAX - 2;
    let bytes = hello_static_builder()
        .section(SectionDef::new(
            ".rodata.high",
            SHT_PROGBITS,
            SHF_ALLOC,
            high,
            b"edge\0\0\0\0abcdefgh".to_vec(),
        ))
        .build();
    let mut config = ExtractionConfig::default();
    config.string_sections = vec![".rodata.high".to_string()];

    let artifact = extract_bytes("high", &bytes, &config).unwrap();
    let strings: Vec<_> = artifact
        .strings()
        .iter()
        .map(|s| (s.value(), s.address()))
        .collect();
    assert_eq!(strings, vec![("edge", high)]);

    let file = create_temp_file(&bytes);
    assert!(load_binary(file.path()).is_some());
}

#[test]
fn test_malformed_inputs_return_none() {
    let junk = create_temp_file(b"definitely not an ELF file");
    assert!(load_binary(junk.path()).is_none());

    let mut truncated = hello_elf();
    truncated.truncate(truncated.len() / 2);
    let cut = create_temp_file(&truncated);
    assert!(load_binary(cut.path()).is_none());

    let empty = create_temp_file(b"");
    assert!(load_binary(empty.path()).is_none());
}

#[test]
fn test_file_size_limit() {
    let file = create_temp_file(&hello_elf());
    let mut config = RevgraphConfig::default();
    config.io.max_file_size = 64;
    let err = revgraph::load_binary_with(file.path(), &config).unwrap_err();
    assert!(matches!(err, revgraph::RevgraphError::FileIo(_)));
}

#[test]
fn test_batch_extraction_skips_failures() {
    let dir = tempfile::tempdir().unwrap();
    let paths = vec![
        write_named(&dir, "a.elf", &hello_elf()),
        write_named(&dir, "broken.bin", b"\x7fELF\x02"),
        write_named(&dir, "b.elf", &hello_static_elf()),
    ];
    let mut artifacts = load_binaries(&paths, &RevgraphConfig::default());
    artifacts.sort_by(|x, y| x.name().cmp(y.name()));
    let names: Vec<_> = artifacts.iter().map(|a| a.name()).collect();
    assert_eq!(names, vec!["a", "b"]);
    assert_ne!(artifacts[0].content_hash(), artifacts[1].content_hash());
}

#[test]
fn test_json_export_round_trip() {
    let artifact = extract_hello();
    let json = serde_json::to_string(&artifact).unwrap();
    let back: BinaryArtifact = serde_json::from_str(&json).unwrap();
    assert_eq!(back, artifact);
}
