//! Integer constants published alongside decoded fields: machine and
//! subsystem identifiers, and the `IMAGE_FILE_HEADER.Characteristics` bits.

use bitflags::bitflags;

pub const MACHINE_I386: i64 = 0x014c;
pub const MACHINE_AMD64: i64 = 0x8664;

pub const SUBSYSTEM_UNKNOWN: i64 = 0;
pub const SUBSYSTEM_NATIVE: i64 = 1;
pub const SUBSYSTEM_WINDOWS_GUI: i64 = 2;
pub const SUBSYSTEM_WINDOWS_CUI: i64 = 3;
pub const SUBSYSTEM_OS2_CUI: i64 = 5;
pub const SUBSYSTEM_POSIX_CUI: i64 = 7;
pub const SUBSYSTEM_NATIVE_WINDOWS: i64 = 8;

bitflags! {
    /// Member names match the published path names, except where a path
    /// starts with a digit (`32BIT_MACHINE`) and can't be a Rust
    /// identifier — see [`CHARACTERISTICS_PATHS`] for the real names.
    pub struct Characteristics: u32 {
        const RELOCS_STRIPPED         = 0x0001;
        const EXECUTABLE_IMAGE        = 0x0002;
        const LINE_NUMS_STRIPPED      = 0x0004;
        const LOCAL_SYMS_STRIPPED     = 0x0008;
        const AGGRESIVE_WS_TRIM       = 0x0010;
        const LARGE_ADDRESS_AWARE     = 0x0020;
        const BYTES_REVERSED_LO       = 0x0080;
        const MACHINE_32BIT           = 0x0100;
        const DEBUG_STRIPPED          = 0x0200;
        const REMOVABLE_RUN_FROM_SWAP = 0x0400;
        const NET_RUN_FROM_SWAP       = 0x0800;
        const SYSTEM                  = 0x1000;
        const DLL                     = 0x2000;
        const UP_SYSTEM_ONLY          = 0x4000;
        const BYTES_REVERSED_HI       = 0x8000;
    }
}

/// `(published path, flag)` pairs, in declaration order. The
/// `"AGGRESIVE_WS_TRIM"` spelling and the `"32BIT_MACHINE"` path (which
/// can't be a Rust identifier) are both part of the published interface,
/// not typos to fix here.
pub const CHARACTERISTICS_PATHS: &[(&str, Characteristics)] = &[
    ("RELOCS_STRIPPED", Characteristics::RELOCS_STRIPPED),
    ("EXECUTABLE_IMAGE", Characteristics::EXECUTABLE_IMAGE),
    ("LINE_NUMS_STRIPPED", Characteristics::LINE_NUMS_STRIPPED),
    ("LOCAL_SYMS_STRIPPED", Characteristics::LOCAL_SYMS_STRIPPED),
    ("AGGRESIVE_WS_TRIM", Characteristics::AGGRESIVE_WS_TRIM),
    ("LARGE_ADDRESS_AWARE", Characteristics::LARGE_ADDRESS_AWARE),
    ("BYTES_REVERSED_LO", Characteristics::BYTES_REVERSED_LO),
    ("32BIT_MACHINE", Characteristics::MACHINE_32BIT),
    ("DEBUG_STRIPPED", Characteristics::DEBUG_STRIPPED),
    ("REMOVABLE_RUN_FROM_SWAP", Characteristics::REMOVABLE_RUN_FROM_SWAP),
    ("NET_RUN_FROM_SWAP", Characteristics::NET_RUN_FROM_SWAP),
    ("SYSTEM", Characteristics::SYSTEM),
    ("DLL", Characteristics::DLL),
    ("UP_SYSTEM_ONLY", Characteristics::UP_SYSTEM_ONLY),
    ("BYTES_REVERSED_HI", Characteristics::BYTES_REVERSED_HI),
];
