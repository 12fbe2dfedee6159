//! Common test utilities and helpers.
//!
//! Integration tests build their inputs in memory: [`ElfBuilder`] lays out a
//! little-endian ELF64 image from section definitions, and [`hello_elf`] produces
//! the reference x86-64 program used across the suite.

#![allow(dead_code)]

pub mod test_utils;

pub const SHT_PROGBITS: u32 = 1;
pub const SHT_SYMTAB: u32 = 2;
pub const SHT_STRTAB: u32 = 3;
pub const SHT_RELA: u32 = 4;
pub const SHT_NOBITS: u32 = 8;
pub const SHT_DYNSYM: u32 = 11;
pub const SHT_GNU_VERNEED: u32 = 0x6fff_fffe;
pub const SHT_GNU_VERSYM: u32 = 0x6fff_ffff;

pub const SHF_WRITE: u64 = 0x1;
pub const SHF_ALLOC: u64 = 0x2;
pub const SHF_EXECINSTR: u64 = 0x4;

pub const STB_LOCAL: u8 = 0;
pub const STB_GLOBAL: u8 = 1;
pub const STT_NOTYPE: u8 = 0;
pub const STT_OBJECT: u8 = 1;
pub const STT_FUNC: u8 = 2;
pub const STT_FILE: u8 = 4;

pub const R_X86_64_JUMP_SLOT: u32 = 7;

pub const TEXT_ADDR: u64 = 0x401000;
pub const PLT_ADDR: u64 = 0x401ff0;
pub const RODATA_ADDR: u64 = 0x403000;
pub const DATA_ADDR: u64 = 0x404000;
pub const MAIN_ADDR: u64 = 0x401000;
pub const COMPUTE_ADDR: u64 = 0x401020;
pub const PRINTF_STUB: u64 = 0x402000;

/// One section of the image being built
#[derive(Debug, Clone)]
pub struct SectionDef {
    pub name: String,
    pub sh_type: u32,
    pub flags: u64,
    pub addr: u64,
    pub data: Vec<u8>,
    /// Section linked through `sh_link`, by name
    pub link: Option<String>,
    pub info: u32,
    pub entsize: u64,
    /// Declared size for `SHT_NOBITS`
    pub nobits_size: u64,
}

impl SectionDef {
    pub fn new(name: &str, sh_type: u32, flags: u64, addr: u64, data: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            sh_type,
            flags,
            addr,
            data,
            link: None,
            info: 0,
            entsize: 0,
            nobits_size: 0,
        }
    }

    pub fn link(mut self, name: &str) -> Self {
        self.link = Some(name.to_string());
        self
    }

    pub fn info(mut self, info: u32) -> Self {
        self.info = info;
        self
    }

    pub fn entsize(mut self, entsize: u64) -> Self {
        self.entsize = entsize;
        self
    }
}

/// A symbol table entry
#[derive(Debug, Clone)]
pub struct SymbolDef {
    pub name: String,
    pub value: u64,
    pub size: u64,
    pub bind: u8,
    pub kind: u8,
    /// Defining section by name; `None` = undefined
    pub section: Option<String>,
}

impl SymbolDef {
    pub fn func(name: &str, value: u64, size: u64) -> Self {
        Self {
            name: name.to_string(),
            value,
            size,
            bind: STB_GLOBAL,
            kind: STT_FUNC,
            section: Some(".text".to_string()),
        }
    }

    pub fn undefined_func(name: &str) -> Self {
        Self {
            name: name.to_string(),
            value: 0,
            size: 0,
            bind: STB_GLOBAL,
            kind: STT_FUNC,
            section: None,
        }
    }

    pub fn with_kind(mut self, kind: u8, bind: u8) -> Self {
        self.kind = kind;
        self.bind = bind;
        self
    }

    pub fn in_section(mut self, section: Option<&str>) -> Self {
        self.section = section.map(str::to_string);
        self
    }
}

/// Builds a little-endian ELF64 image
#[derive(Debug, Clone)]
pub struct ElfBuilder {
    pub machine: u16,
    pub e_type: u16,
    pub entry: u64,
    pub sections: Vec<SectionDef>,
}

impl ElfBuilder {
    pub fn new() -> Self {
        Self {
            machine: 62,
            e_type: 2,
            entry: TEXT_ADDR,
            sections: Vec::new(),
        }
    }

    pub fn machine(mut self, machine: u16) -> Self {
        self.machine = machine;
        self
    }

    pub fn section(mut self, def: SectionDef) -> Self {
        self.sections.push(def);
        self
    }

    /// Add a symbol table and its string table
    pub fn symbols(self, table: &str, strtab: &str, sh_type: u32, symbols: &[SymbolDef]) -> Self {
        let (names, offsets) = string_table(symbols.iter().map(|s| s.name.as_str()));
        let mut data = vec![0u8; 24];
        for (sym, name_off) in symbols.iter().zip(offsets) {
            let shndx = match &sym.section {
                Some(section) => self.index_of(section).unwrap_or(0xfff1) as u16,
                None => 0,
            };
            data.extend_from_slice(&name_off.to_le_bytes());
            data.push((sym.bind << 4) | (sym.kind & 0xf));
            data.push(0);
            data.extend_from_slice(&shndx.to_le_bytes());
            data.extend_from_slice(&sym.value.to_le_bytes());
            data.extend_from_slice(&sym.size.to_le_bytes());
        }
        let alloc = if sh_type == SHT_DYNSYM { SHF_ALLOC } else { 0 };
        self.section(SectionDef::new(strtab, SHT_STRTAB, alloc, 0, names))
            .section(
                SectionDef::new(table, sh_type, alloc, 0, data)
                    .link(strtab)
                    .info(1)
                    .entsize(24),
            )
    }

    /// Section header index a section will get (index 0 is the null header)
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.sections.iter().position(|s| s.name == name).map(|i| i + 1)
    }

    pub fn build(&self) -> Vec<u8> {
        let mut all = self.sections.clone();
        let (shstrtab, name_offsets) = string_table(
            all.iter()
                .map(|s| s.name.as_str())
                .chain(std::iter::once(".shstrtab")),
        );
        all.push(SectionDef::new(".shstrtab", SHT_STRTAB, 0, 0, shstrtab));

        let mut out = vec![0u8; 64];
        let mut offsets = Vec::with_capacity(all.len());
        for def in &all {
            align(&mut out, 8);
            offsets.push(out.len() as u64);
            if def.sh_type != SHT_NOBITS {
                out.extend_from_slice(&def.data);
            }
        }
        align(&mut out, 8);
        let shoff = out.len() as u64;

        // Null section header
        out.extend_from_slice(&[0u8; 64]);
        for ((def, offset), name) in all.iter().zip(&offsets).zip(&name_offsets) {
            let link = def
                .link
                .as_deref()
                .and_then(|l| all.iter().position(|s| s.name == l))
                .map(|i| i as u32 + 1)
                .unwrap_or(0);
            let size = if def.sh_type == SHT_NOBITS {
                def.nobits_size
            } else {
                def.data.len() as u64
            };
            out.extend_from_slice(&name.to_le_bytes());
            out.extend_from_slice(&def.sh_type.to_le_bytes());
            out.extend_from_slice(&def.flags.to_le_bytes());
            out.extend_from_slice(&def.addr.to_le_bytes());
            out.extend_from_slice(&offset.to_le_bytes());
            out.extend_from_slice(&size.to_le_bytes());
            out.extend_from_slice(&link.to_le_bytes());
            out.extend_from_slice(&def.info.to_le_bytes());
            out.extend_from_slice(&8u64.to_le_bytes());
            out.extend_from_slice(&def.entsize.to_le_bytes());
        }

        let shnum = all.len() as u16 + 1;
        out[0..4].copy_from_slice(b"\x7fELF");
        out[4] = 2; // ELFCLASS64
        out[5] = 1; // little endian
        out[6] = 1;
        out[16..18].copy_from_slice(&self.e_type.to_le_bytes());
        out[18..20].copy_from_slice(&self.machine.to_le_bytes());
        out[20..24].copy_from_slice(&1u32.to_le_bytes());
        out[24..32].copy_from_slice(&self.entry.to_le_bytes());
        out[40..48].copy_from_slice(&shoff.to_le_bytes());
        out[52..54].copy_from_slice(&64u16.to_le_bytes());
        out[54..56].copy_from_slice(&56u16.to_le_bytes());
        out[58..60].copy_from_slice(&64u16.to_le_bytes());
        out[60..62].copy_from_slice(&shnum.to_le_bytes());
        out[62..64].copy_from_slice(&(shnum - 1).to_le_bytes());
        out
    }
}

impl Default for ElfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn align(buf: &mut Vec<u8>, to: usize) {
    while buf.len() % to != 0 {
        buf.push(0);
    }
}

/// NUL-separated string table with a leading empty string; returns the offsets
pub fn string_table<'a>(names: impl Iterator<Item = &'a str>) -> (Vec<u8>, Vec<u32>) {
    let mut data = vec![0u8];
    let mut offsets = Vec::new();
    for name in names {
        offsets.push(data.len() as u32);
        data.extend_from_slice(name.as_bytes());
        data.push(0);
    }
    (data, offsets)
}

/// `.text` of the reference program.
///
/// `main` (0x401000, 20 bytes): `lea rdi,[rip+0x1ff9]` -> 0x403000,
/// `call 0x402000` (printf stub), `ret`, 7 x `nop`.
/// `compute` (0x401020, 6 bytes): `call main`, `ret`.
pub fn hello_text() -> Vec<u8> {
    let mut code = vec![
        0x48, 0x8d, 0x3d, 0xf9, 0x1f, 0x00, 0x00, // lea rdi, [rip+0x1ff9]
        0xe8, 0xf4, 0x0f, 0x00, 0x00, // call 0x402000
        0xc3, // ret
    ];
    code.extend([0x90; 7]);
    // _start at 0x401014
    code.extend([0x31, 0xed, 0xc3, 0x90]);
    code.extend([0xcc; 8]);
    code.extend([0xe8, 0xdb, 0xff, 0xff, 0xff, 0xc3]);
    code
}

/// Builder for the reference program, without its dynamic-linking sections
pub fn hello_static_builder() -> ElfBuilder {
    let mut rodata = b"Hello, world\0".to_vec();
    rodata.extend_from_slice(b"\x01\x02usage: hello\0");
    ElfBuilder::new()
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
            vec![0xcc; 32],
        ))
        .section(SectionDef::new(".rodata", SHT_PROGBITS, SHF_ALLOC, RODATA_ADDR, rodata))
        .section(SectionDef::new(
            ".data",
            SHT_PROGBITS,
            SHF_ALLOC | SHF_WRITE,
            DATA_ADDR,
            b"\0\0\0\0config.ini\0".to_vec(),
        ))
}

fn static_symbols() -> Vec<SymbolDef> {
    vec![
        SymbolDef::func("hello.c", 0, 0)
            .with_kind(STT_FILE, STB_LOCAL)
            .in_section(None),
        SymbolDef::func("main", MAIN_ADDR, 20),
        // Untyped alias at main's address must not displace it
        SymbolDef::func("main_alias", MAIN_ADDR, 0).with_kind(STT_NOTYPE, STB_GLOBAL),
        SymbolDef::func("_start", 0x401014, 4),
        SymbolDef::func("compute", COMPUTE_ADDR, 6),
        SymbolDef::func("banner", RODATA_ADDR, 13)
            .with_kind(STT_OBJECT, STB_GLOBAL)
            .in_section(Some(".rodata")),
    ]
}

/// The reference program with `.symtab` only
pub fn hello_static_elf() -> Vec<u8> {
    let builder = hello_static_builder();
    builder
        .clone()
        .symbols(".symtab", ".strtab", SHT_SYMTAB, &static_symbols())
        .build()
}

/// The reference program dynamically linked against `libc.so.6`.
///
/// `.rela.plt` binds relocation 0 (`printf`) to stub 0x402000; `puts` is an
/// undefined function with no relocation.
pub fn hello_elf() -> Vec<u8> {
    let dynsyms = vec![
        SymbolDef::undefined_func("printf"),
        SymbolDef::undefined_func("puts"),
    ];
    let mut builder = hello_static_builder()
        .symbols(".symtab", ".strtab", SHT_SYMTAB, &static_symbols())
        .symbols(".dynsym", ".dynstr", SHT_DYNSYM, &dynsyms);

    // .dynstr is "\0printf\0puts\0"; append the needed file and version names
    let dynstr = &mut builder
        .sections
        .iter_mut()
        .find(|s| s.name == ".dynstr")
        .expect("dynstr section")
        .data;
    let libc_off = dynstr.len() as u32;
    dynstr.extend_from_slice(b"libc.so.6\0");
    let glibc_off = dynstr.len() as u32;
    dynstr.extend_from_slice(b"GLIBC_2.2.5\0");

    let mut rela = Vec::new();
    rela.extend_from_slice(&0x404018u64.to_le_bytes());
    rela.extend_from_slice(&((1u64 << 32) | R_X86_64_JUMP_SLOT as u64).to_le_bytes());
    rela.extend_from_slice(&0i64.to_le_bytes());

    // versym: null, printf, puts -> version 2
    let mut versym = Vec::new();
    for v in [0u16, 2, 2] {
        versym.extend_from_slice(&v.to_le_bytes());
    }

    let mut verneed = Vec::new();
    verneed.extend_from_slice(&1u16.to_le_bytes()); // vn_version
    verneed.extend_from_slice(&1u16.to_le_bytes()); // vn_cnt
    verneed.extend_from_slice(&libc_off.to_le_bytes()); // vn_file
    verneed.extend_from_slice(&16u32.to_le_bytes()); // vn_aux
    verneed.extend_from_slice(&0u32.to_le_bytes()); // vn_next
    verneed.extend_from_slice(&0x09691a75u32.to_le_bytes()); // vna_hash
    verneed.extend_from_slice(&0u16.to_le_bytes()); // vna_flags
    verneed.extend_from_slice(&2u16.to_le_bytes()); // vna_other
    verneed.extend_from_slice(&glibc_off.to_le_bytes()); // vna_name
    verneed.extend_from_slice(&0u32.to_le_bytes()); // vna_next

    builder
        .section(
            SectionDef::new(".rela.plt", SHT_RELA, SHF_ALLOC, 0, rela)
                .link(".dynsym")
                .entsize(24),
        )
        .section(
            SectionDef::new(".gnu.version", SHT_GNU_VERSYM, SHF_ALLOC, 0, versym)
                .link(".dynsym")
                .entsize(2),
        )
        .section(
            SectionDef::new(".gnu.version_r", SHT_GNU_VERNEED, SHF_ALLOC, 0, verneed)
                .link(".dynstr")
                .info(1),
        )
        .build()
}
