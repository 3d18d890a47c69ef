//! Portable Executable (PE32 / PE32+) headers, section table and resource tree.
//!
//! The DOS header's `e_lfanew` locates the PE signature; everything after it is parsed as
//! a sub-structure at that offset. A section named `.rsrc` additionally computes the
//! virtual address to file offset delta and decodes the resource directory at the
//! section's raw data pointer.

use crate::ast::{
    cho, def, def_if, def_sized, let_, nod, pre, repn, resource_directory, seq, seq_enc, sub, Token,
};
use crate::decode::Format;
use crate::encoding::Encoding;
use crate::expr::{con, con_bytes, eq, eq_num, eq_num_of, eq_of, if_else, last, Expr, ValueExpr};
use std::sync::Arc;

const CHAR: u64 = 1;
const SHORT: u64 = 2;
const LONG: u64 = 4;

const PE32: i128 = 0x10b;
const PE32_PLUS: i128 = 0x20b;
const ROM: i128 = 0x107;

/// Name of the `Let` holding `VirtualAddress - PointerToRawData` of the resource section.
pub const RESOURCE_DELTA: &str = "VirtualAddressPointerToRawDataDelta";

const PE_TYPE: &str = "peArchitectureType";

const MACHINES: &[(&str, i128)] = &[
    ("Intel 386", 0x14c),
    ("x64", 0x8664),
    ("MIPS R3000", 0x162),
    ("MIPS R10000", 0x168),
    ("MIPS little endian WCI v2", 0x169),
    ("old Alpha AXP", 0x183),
    ("Alpha AXP", 0x184),
    ("Hitachi SH3", 0x1a2),
    ("Hitachi SH3 DSP", 0x1a3),
    ("Hitachi SH4", 0x1a6),
    ("Hitachi SH5", 0x1a8),
    ("ARM little endian", 0x1c0),
    ("Thumb", 0x1c2),
    ("ARMv7 Thumb-2", 0x1c4),
    ("Matsushita AM33", 0x1d3),
    ("PowerPC little endian", 0x1f0),
    ("PowerPC with floating point support", 0x1f1),
    ("Intel IA64", 0x200),
    ("MIPS16", 0x266),
    ("Motorola 68000 series", 0x268),
    ("Alpha AXP 64-bit", 0x284),
    ("MIPS with FPU", 0x366),
    ("MIPS16 with FPU", 0x466),
    ("EFI Byte Code", 0xebc),
    ("ARM64 little endian", 0xaa64),
    ("Mitsubishi M32R little endian", 0x9041),
    ("clr pure MSIL", 0xc0ee),
];

const SUBSYSTEMS: &[(&str, i128)] = &[
    ("Unknown subsystem", 0),
    ("Native", 1),
    ("Windows GUI", 2),
    ("Windows CUI", 3),
    ("OS/2 CUI", 5),
    ("POSIX CUI", 7),
    ("Windows CE", 9),
    ("EFI application", 10),
    ("EFI boot service driver", 11),
    ("EFI runtime driver", 12),
    ("EFI ROM", 13),
    ("Xbox", 14),
    ("Windows boot application", 16),
];

const DATA_DIRECTORIES: &[&str] = &[
    "ExportTable",
    "ImportTable",
    "ResourceTable",
    "ExceptionTable",
    "CertificateTable",
    "BaseRelocationTable",
    "DebugTable",
    "ArchitectureTable",
    "GlobalPointerRegisterTable",
    "ThreadLocalStorageTable",
    "LoadConfigurationTable",
    "BoundImportTable",
    "ImportAddressTable",
    "DelayImportDescriptor",
    "CLRRuntimeHeader",
];

fn is_pe32() -> Expr {
    eq_num_of(last(PE_TYPE), con(PE32))
}

/// 4 bytes in PE32, 8 in PE32+.
fn word_size() -> ValueExpr {
    if_else(is_pe32(), con(LONG as i128), con(2 * LONG as i128))
}

fn word(name: &str) -> Arc<Token> {
    def_sized(name, word_size(), Expr::True)
}

fn enumerated(name: &str, size: u64, table: &[(&str, i128)]) -> Arc<Token> {
    cho(
        name,
        table
            .iter()
            .map(|(label, v)| def_if(label, size, eq_num(con(*v))))
            .collect(),
    )
}

pub fn dos_header() -> Arc<Token> {
    seq(
        "DosHeader",
        vec![
            def_if("signature", 2, eq(con_bytes(b"MZ"))),
            def("lastsize", SHORT),
            def("nblocks", SHORT),
            def("nreloc", SHORT),
            def("hdrsize", SHORT),
            def("minalloc", SHORT),
            def("maxalloc", SHORT),
            def("*ss", SHORT),
            def("*sp", SHORT),
            def("checksum", SHORT),
            def("*ip", SHORT),
            def("*cs", SHORT),
            def("relocpos", SHORT),
            def("noverlay", SHORT),
            def("reserved1", SHORT * 4),
            def("oem_id", SHORT),
            def("oem_info", SHORT),
            def("reserved2", SHORT * 10),
            def("e_lfanew", LONG),
        ],
    )
}

pub fn pe_signature() -> Arc<Token> {
    seq("PE Header", vec![def_if("PE_HEADER", 4, eq(con_bytes(b"PE\0\0")))])
}

pub fn coff_header() -> Arc<Token> {
    seq(
        "COFF Header",
        vec![
            enumerated("Machine", SHORT, MACHINES),
            def("NumberOfSections", SHORT),
            def("CreatedOn", LONG),
            def("PointerToSymbolTable", LONG),
            def("NumberOfSymbols", LONG),
            def("SizeOfOptionalHeader", SHORT),
            def("Characteristics", SHORT),
        ],
    )
}

fn data_directory(name: &str) -> Arc<Token> {
    seq(name, vec![def("offset", LONG), def("size", LONG)])
}

pub fn optional_header() -> Arc<Token> {
    let mut fields = vec![
        cho(
            "Magic",
            vec![
                def_if(PE_TYPE, SHORT, eq_num(con(PE32))),
                def_if(PE_TYPE, SHORT, eq_num(con(PE32_PLUS))),
                def_if(PE_TYPE, SHORT, eq_num(con(ROM))),
            ],
        ),
        def("MajorLinkerVersion", CHAR),
        def("MinorLinkerVersion", CHAR),
        def("SizeOfCode", LONG),
        def("SizeOfInitializedData", LONG),
        def("SizeOfUninitializedData", LONG),
        def("AddressOfEntryPoint", LONG),
        def("BaseOfCode", LONG),
        // PE32 only
        pre(def("BaseOfData", LONG), is_pe32()),
        word("ImageBase"),
        def("SectionAlignment", LONG),
        def("FileAlignment", LONG),
        def("MajorOSVersion", SHORT),
        def("MinorOSVersion", SHORT),
        def("MajorImageVersion", SHORT),
        def("MinorImageVersion", SHORT),
        def("MajorSubsystemVersion", SHORT),
        def("MinorSubsystemVersion", SHORT),
        def_if("Win32VersionValue", LONG, eq_num(con(0))),
        def("SizeOfImage", LONG),
        def("SizeOfHeaders", LONG),
        def("Checksum", LONG),
        enumerated("Subsystem", SHORT, SUBSYSTEMS),
        def("DLLCharacteristics", SHORT),
        word("SizeOfStackReserve"),
        word("SizeOfStackCommit"),
        word("SizeOfHeapReserve"),
        word("SizeOfHeapCommit"),
        def("LoaderFlags", LONG),
        def_if("NumberOfRvaAndSizes", LONG, eq_num(con(16))),
    ];
    fields.extend(DATA_DIRECTORIES.iter().map(|name| data_directory(name)));
    fields.push(nod(con(2 * LONG as i128)));
    seq("PE Optional Header", fields)
}

/// One section header; `.rsrc` also decodes its resource tree.
pub fn section_header() -> Arc<Token> {
    seq(
        "Section",
        vec![
            def("Name", 8),
            def("VirtualSize", LONG),
            def("VirtualAddress", LONG),
            def("SizeOfRawData", LONG),
            def("PointerToRawData", LONG),
            def("PointerToRelocations", LONG),
            def("PointerToLinenumbers", LONG),
            def("NumberOfRelocations", SHORT),
            def("NumberOfLinenumbers", SHORT),
            def("Characteristics", LONG),
            pre(
                seq(
                    "Resources",
                    vec![
                        let_(RESOURCE_DELTA, last("VirtualAddress") - last("PointerToRawData")),
                        sub(
                            resource_directory("ResourceDirectory", last(RESOURCE_DELTA)),
                            last("PointerToRawData"),
                        ),
                    ],
                ),
                eq_of(last("Name"), con_bytes(b".rsrc\0\0\0")),
            ),
        ],
    )
}

pub fn token() -> Arc<Token> {
    seq_enc(
        "EXE",
        Encoding::little_endian(),
        vec![
            dos_header(),
            sub(
                seq(
                    "PE",
                    vec![
                        pe_signature(),
                        coff_header(),
                        optional_header(),
                        repn("Code Sections", section_header(), last("NumberOfSections")),
                    ],
                ),
                last("e_lfanew"),
            ),
        ],
    )
}

pub fn format() -> Format {
    Format::new("pe", token(), Encoding::little_endian())
}
