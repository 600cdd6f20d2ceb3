//! DOS/NT header validation and the 32/64-bit optional-header view.
//!
//! Validation order is fixed and must not be reordered: DOS magic →
//! `e_lfanew` sign → headers-size fit → NT signature → machine whitelist →
//! `SizeOfOptionalHeader` fit. Anything that fails any step yields `None`
//! ("not a PE"), never a panic and never a partially-populated anchor.

use std::convert::TryFrom;

use crate::reader::Reader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Machine {
    Unknown = 0,
    AMD64 = 0x8664,
    IA64 = 0x200,
    I386 = 0x14C,
}

impl TryFrom<u16> for Machine {
    type Error = u16;

    fn try_from(n: u16) -> Result<Self, Self::Error> {
        match n {
            0 => Ok(Self::Unknown),
            0x8664 => Ok(Self::AMD64),
            0x200 => Ok(Self::IA64),
            0x14C => Ok(Self::I386),
            _ => Err(n),
        }
    }
}

impl Machine {
    /// Anything outside this set isn't a PE we accept, even if it parses
    /// cleanly.
    fn is_supported(self) -> bool {
        matches!(self, Machine::I386 | Machine::AMD64)
    }

    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

/// Which optional-header layout (and thunk/pointer width) this image uses.
/// Discriminated solely by `FileHeader.Machine == AMD64`, matching the
/// original; the optional header's own magic number is never consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bitness {
    Pe32,
    Pe32Plus,
}

/// `IMAGE_FILE_HEADER` fields we need, minus the COFF symbol-table fields
/// nothing downstream surfaces.
#[derive(Debug, Clone, Copy)]
pub struct FileHeader {
    pub machine: Machine,
    pub number_of_sections: u16,
    pub timestamp: u32,
    pub size_of_optional_header: u16,
    pub characteristics: u16,
}

/// The subset of the optional header published as scalars, plus what's
/// needed to fetch data directories later.
#[derive(Debug, Clone, Copy)]
pub struct OptionalHeader {
    pub bitness: Bitness,
    pub address_of_entry_point: u32,
    pub image_base: u64,
    pub major_linker_version: u8,
    pub minor_linker_version: u8,
    pub major_os_version: u16,
    pub minor_os_version: u16,
    pub major_image_version: u16,
    pub minor_image_version: u16,
    pub major_subsystem_version: u16,
    pub minor_subsystem_version: u16,
    pub subsystem: u16,
    /// Absolute offset (within the host's slice) of `DataDirectory[0]`.
    pub data_directory_offset: u64,
}

/// The validated anchor returned by [`get_header`]: everything downstream
/// parsing needs to locate sections, directories and data.
#[derive(Debug, Clone, Copy)]
pub struct Anchor {
    /// Offset of the NT headers (the `PE\0\0` signature) within the host
    /// slice. Bound checks for sections, directories and the resource tree
    /// all measure "remaining buffer" from this point, matching the
    /// original's `pe_size` semantics (see DESIGN.md).
    pub nt_offset: u64,
    pub file_header: FileHeader,
    pub optional_header: OptionalHeader,
    /// Absolute offset of the first section header.
    pub section_table_offset: u64,
}

const DOS_HEADER_SIZE: u64 = 64;
const E_LFANEW_OFFSET: u64 = 0x3c;
const NT_SIGNATURE: &[u8; 4] = b"PE\0\0";
const FILE_HEADER_SIZE: u64 = 20;

/// Layout offsets (relative to the start of the optional header) that
/// differ between `IMAGE_OPTIONAL_HEADER32` and `...64`. Only the fields we
/// actually read are listed.
struct OptionalHeaderLayout {
    image_base_offset: u64,
    image_base_is_64_bit: bool,
    data_directory_offset: u64,
}

impl OptionalHeaderLayout {
    fn for_bitness(bitness: Bitness) -> Self {
        match bitness {
            Bitness::Pe32 => OptionalHeaderLayout {
                image_base_offset: 28,
                image_base_is_64_bit: false,
                data_directory_offset: 96,
            },
            Bitness::Pe32Plus => OptionalHeaderLayout {
                image_base_offset: 24,
                image_base_is_64_bit: true,
                data_directory_offset: 112,
            },
        }
    }
}

// Fields common to both layouts (relative to the start of the optional
// header); these offsets are identical in IMAGE_OPTIONAL_HEADER{32,64}.
const ADDRESS_OF_ENTRY_POINT_OFFSET: u64 = 16;
const MAJOR_LINKER_VERSION_OFFSET: u64 = 2;
const MINOR_LINKER_VERSION_OFFSET: u64 = 3;
const MAJOR_OS_VERSION_OFFSET: u64 = 40;
const MINOR_OS_VERSION_OFFSET: u64 = 42;
const MAJOR_IMAGE_VERSION_OFFSET: u64 = 44;
const MINOR_IMAGE_VERSION_OFFSET: u64 = 46;
const MAJOR_SUBSYSTEM_VERSION_OFFSET: u64 = 48;
const MINOR_SUBSYSTEM_VERSION_OFFSET: u64 = 50;
const SUBSYSTEM_OFFSET: u64 = 68;

/// Locates and validates the DOS+NT headers starting at `candidate_offset`
/// within `image`, returning the anchor from which all further parsing
/// proceeds. `None` means "not a PE we accept" — never a panic, never a
/// partial result.
pub fn get_header(image: &Reader, candidate_offset: u64) -> Option<Anchor> {
    if !image.fits(candidate_offset, DOS_HEADER_SIZE) {
        return None;
    }

    if image.slice(candidate_offset, 2)? != b"MZ" {
        return None;
    }

    let e_lfanew_raw = image.u32(candidate_offset + E_LFANEW_OFFSET)?;
    if e_lfanew_raw > i32::MAX as u32 {
        // e_lfanew < 0
        return None;
    }

    let nt_offset = candidate_offset.checked_add(e_lfanew_raw as u64)?;
    let file_header_offset = nt_offset.checked_add(4)?;

    // headers_size = e_lfanew + sizeof(Signature) + sizeof(IMAGE_FILE_HEADER)
    if !image.fits(nt_offset, 4 + FILE_HEADER_SIZE) {
        return None;
    }

    if image.slice(nt_offset, 4)? != NT_SIGNATURE {
        return None;
    }

    let machine_raw = image.u16(file_header_offset)?;
    let machine = Machine::try_from(machine_raw).ok()?;
    if !machine.is_supported() {
        return None;
    }

    let number_of_sections = image.u16(file_header_offset + 2)?;
    let timestamp = image.u32(file_header_offset + 4)?;
    let size_of_optional_header = image.u16(file_header_offset + 16)?;
    let characteristics = image.u16(file_header_offset + 18)?;

    let optional_header_offset = file_header_offset + FILE_HEADER_SIZE;

    // headers_size += SizeOfOptionalHeader; require buffer_length strictly
    // greater than the total, matching the original's `>` (not `>=`).
    let total_headers_size = optional_header_offset + size_of_optional_header as u64;
    if total_headers_size >= image.len() {
        return None;
    }

    let bitness = if machine == Machine::AMD64 {
        Bitness::Pe32Plus
    } else {
        Bitness::Pe32
    };
    let layout = OptionalHeaderLayout::for_bitness(bitness);

    let address_of_entry_point =
        image.u32(optional_header_offset + ADDRESS_OF_ENTRY_POINT_OFFSET)?;
    let major_linker_version = image.u8(optional_header_offset + MAJOR_LINKER_VERSION_OFFSET)?;
    let minor_linker_version = image.u8(optional_header_offset + MINOR_LINKER_VERSION_OFFSET)?;
    let image_base = if layout.image_base_is_64_bit {
        image.u64(optional_header_offset + layout.image_base_offset)?
    } else {
        image.u32(optional_header_offset + layout.image_base_offset)? as u64
    };
    let major_os_version = image.u16(optional_header_offset + MAJOR_OS_VERSION_OFFSET)?;
    let minor_os_version = image.u16(optional_header_offset + MINOR_OS_VERSION_OFFSET)?;
    let major_image_version = image.u16(optional_header_offset + MAJOR_IMAGE_VERSION_OFFSET)?;
    let minor_image_version = image.u16(optional_header_offset + MINOR_IMAGE_VERSION_OFFSET)?;
    let major_subsystem_version =
        image.u16(optional_header_offset + MAJOR_SUBSYSTEM_VERSION_OFFSET)?;
    let minor_subsystem_version =
        image.u16(optional_header_offset + MINOR_SUBSYSTEM_VERSION_OFFSET)?;
    let subsystem = image.u16(optional_header_offset + SUBSYSTEM_OFFSET)?;

    let optional_header = OptionalHeader {
        bitness,
        address_of_entry_point,
        image_base,
        major_linker_version,
        minor_linker_version,
        major_os_version,
        minor_os_version,
        major_image_version,
        minor_image_version,
        major_subsystem_version,
        minor_subsystem_version,
        subsystem,
        data_directory_offset: optional_header_offset + layout.data_directory_offset,
    };

    let file_header = FileHeader {
        machine,
        number_of_sections,
        timestamp,
        size_of_optional_header,
        characteristics,
    };

    Some(Anchor {
        nt_offset,
        file_header,
        optional_header,
        section_table_offset: optional_header_offset + size_of_optional_header as u64,
    })
}

/// Well-known `DataDirectory` indices (`IMAGE_DIRECTORY_ENTRY_*`).
#[derive(Debug, Clone, Copy)]
pub enum DataDirectoryIndex {
    Export = 0,
    Import = 1,
    Resource = 2,
}

/// A single `(VirtualAddress, Size)` data directory entry. Fetched purely
/// against `data.len()`, exactly like the original: it never checks the
/// entry against `NumberOfRvaAndSizes` or `SizeOfOptionalHeader`, so a
/// deliberately undersized optional header can make this read into
/// whatever bytes happen to follow it in the buffer.
pub fn data_directory(
    image: &Reader,
    optional_header: &OptionalHeader,
    index: DataDirectoryIndex,
) -> Option<(u32, u32)> {
    let entry_offset = optional_header
        .data_directory_offset
        .checked_add(index as u64 * 8)?;
    let virtual_address = image.u32(entry_offset)?;
    let size = image.u32(entry_offset + 4)?;
    Some((virtual_address, size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_buffer() {
        let data = [0u8; 10];
        let reader = Reader::new(&data);
        assert!(get_header(&reader, 0).is_none());
    }

    #[test]
    fn rejects_missing_dos_magic() {
        let data = [0u8; 128];
        let reader = Reader::new(&data);
        assert!(get_header(&reader, 0).is_none());
    }

    #[test]
    fn rejects_unsupported_machine() {
        let mut data = vec![0u8; 0x200];
        data[0] = b'M';
        data[1] = b'Z';
        data[0x3c..0x40].copy_from_slice(&0x40u32.to_le_bytes());
        data[0x40..0x44].copy_from_slice(NT_SIGNATURE);
        // IA64, not in the whitelist.
        data[0x44..0x46].copy_from_slice(&0x200u16.to_le_bytes());
        let reader = Reader::new(&data);
        assert!(get_header(&reader, 0).is_none());
    }
}
