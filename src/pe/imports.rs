//! Import directory traversal: DLL plus function name lookup.

use crate::pe::header::{Anchor, DataDirectoryIndex, Machine};
use crate::pe::sections::rva_to_offset;
use crate::pe::util::{strncasecmp_eq, strncmp_eq};
use crate::reader::Reader;

const IMPORT_DESCRIPTOR_SIZE: u64 = 20;
const IMPORT_DESCRIPTOR_ORIGINAL_FIRST_THUNK_OFFSET: u64 = 0;
const IMPORT_DESCRIPTOR_NAME_OFFSET: u64 = 12;

const THUNK32_SIZE: u64 = 4;
const THUNK64_SIZE: u64 = 8;
const ORDINAL_FLAG32: u32 = 0x8000_0000;
const ORDINAL_FLAG64: u64 = 0x8000_0000_0000_0000;

// `IMAGE_IMPORT_BY_NAME`: a `Hint` WORD followed by the name bytes. The
// struct's own size (2-byte-aligned) is what bounds the lookup before the
// name itself is read.
const IMPORT_BY_NAME_SIZE: u64 = 4;
const IMPORT_BY_NAME_NAME_OFFSET: u64 = 2;

fn to_offset(image: &Reader, anchor: &Anchor, rva: u32) -> u64 {
    rva_to_offset(
        image,
        anchor.nt_offset,
        image.len() - anchor.nt_offset,
        anchor.section_table_offset,
        anchor.file_header.number_of_sections,
        rva,
    )
}

/// `imports(dll_name, function_name) -> {present, absent}`.
///
/// The DLL name match is case-insensitive and bounded by whatever remains
/// of the buffer, so it behaves as full equality in practice. The function
/// name match is case-sensitive and bounded by `function_name`'s own
/// length, so a query that is a strict prefix of a longer stored import
/// name is incorrectly accepted — see [`crate::pe::exports::exports`] for
/// the export lookup's different bound and why that one doesn't share the
/// bug. Never panics, never reads outside `image`.
pub fn imports(image: &Reader, anchor: &Anchor, dll_name: &[u8], function_name: &[u8]) -> bool {
    let (import_rva, _size) = match crate::pe::header::data_directory(
        image,
        &anchor.optional_header,
        DataDirectoryIndex::Import,
    ) {
        Some(d) => d,
        None => return false,
    };
    if import_rva == 0 {
        return false;
    }

    let mut descriptor_offset = to_offset(image, anchor, import_rva);
    if descriptor_offset == 0 || !image.fits(descriptor_offset, IMPORT_DESCRIPTOR_SIZE) {
        return false;
    }

    loop {
        if !image.fits(descriptor_offset, IMPORT_DESCRIPTOR_SIZE) {
            return false;
        }

        let name_rva = match image.u32(descriptor_offset + IMPORT_DESCRIPTOR_NAME_OFFSET) {
            Some(v) => v,
            None => return false,
        };
        if name_rva == 0 {
            return false;
        }

        if dll_name_matches(image, anchor, name_rva, dll_name)
            && scan_thunks(image, anchor, descriptor_offset, function_name)
        {
            return true;
        }

        descriptor_offset += IMPORT_DESCRIPTOR_SIZE;
    }
}

fn dll_name_matches(image: &Reader, anchor: &Anchor, name_rva: u32, dll_name: &[u8]) -> bool {
    let name_offset = to_offset(image, anchor, name_rva);
    if name_offset == 0 || name_offset > image.len() {
        return false;
    }
    let bound = image.len() - name_offset;
    let name = match image.cstr_bounded(name_offset, bound) {
        Some(n) => n,
        None => return false,
    };
    strncasecmp_eq(dll_name, name, bound)
}

fn scan_thunks(image: &Reader, anchor: &Anchor, descriptor_offset: u64, function_name: &[u8]) -> bool {
    let original_first_thunk = match image
        .u32(descriptor_offset + IMPORT_DESCRIPTOR_ORIGINAL_FIRST_THUNK_OFFSET)
    {
        Some(v) => v,
        None => return false,
    };

    let thunk_table_offset = to_offset(image, anchor, original_first_thunk);
    if thunk_table_offset == 0 {
        return false;
    }

    if anchor.file_header.machine == Machine::AMD64 {
        scan_thunks64(image, anchor, thunk_table_offset, function_name)
    } else {
        scan_thunks32(image, anchor, thunk_table_offset, function_name)
    }
}

fn scan_thunks32(image: &Reader, anchor: &Anchor, mut offset: u64, function_name: &[u8]) -> bool {
    loop {
        if !image.fits(offset, THUNK32_SIZE) {
            return false;
        }
        let ordinal = match image.u32(offset) {
            Some(v) => v,
            None => return false,
        };
        if ordinal == 0 {
            return false;
        }

        if ordinal & ORDINAL_FLAG32 == 0 {
            let func_offset = to_offset(image, anchor, ordinal);
            if func_offset != 0
                && image.fits(func_offset, IMPORT_BY_NAME_SIZE)
                && match_import_by_name(image, func_offset, function_name)
            {
                return true;
            }
        }

        offset += THUNK32_SIZE;
    }
}

fn scan_thunks64(image: &Reader, anchor: &Anchor, mut offset: u64, function_name: &[u8]) -> bool {
    loop {
        if !image.fits(offset, THUNK64_SIZE) {
            return false;
        }
        let ordinal = match image.u64(offset) {
            Some(v) => v,
            None => return false,
        };
        if ordinal == 0 {
            return false;
        }

        if ordinal & ORDINAL_FLAG64 == 0 {
            let func_offset = to_offset(image, anchor, ordinal as u32);
            if func_offset != 0
                && image.fits(func_offset, IMPORT_BY_NAME_SIZE)
                && match_import_by_name(image, func_offset, function_name)
            {
                return true;
            }
        }

        offset += THUNK64_SIZE;
    }
}

fn match_import_by_name(image: &Reader, offset: u64, function_name: &[u8]) -> bool {
    let name_offset = offset + IMPORT_BY_NAME_NAME_OFFSET;
    let function_name_len = function_name.len() as u64;

    let available = match image.len().checked_sub(name_offset) {
        Some(a) => a,
        None => return false,
    };
    if available < function_name_len {
        return false;
    }

    match image.cstr_bounded(name_offset, function_name_len) {
        Some(name) => strncmp_eq(name, function_name, function_name_len),
        None => false,
    }
}
