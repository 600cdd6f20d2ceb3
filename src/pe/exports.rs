//! Export directory traversal for name-based export lookup.

use crate::pe::header::{Anchor, DataDirectoryIndex};
use crate::pe::sections::rva_to_offset;
use crate::pe::util::strncmp_eq;
use crate::reader::Reader;

const EXPORT_DIRECTORY_NUMBER_OF_NAMES_OFFSET: u64 = 24;
const EXPORT_DIRECTORY_ADDRESS_OF_NAMES_OFFSET: u64 = 32;

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

/// `exports(function_name) -> {present, absent}`. Returns `false` (absent)
/// if the export directory is missing, maps out of range, or the name
/// table maps out of range — never panics, never reads outside `image`.
///
/// The final string comparison bounds its scan by `data.len() - offset`
/// (everything left in the buffer), not by `function_name`'s length. Since
/// that bound is almost always far longer than either string, the result is
/// effectively a full equality check — unlike the import lookup, which
/// bounds the same comparison by the query's own length and so accepts a
/// query that is a strict prefix of a longer stored name. Both lookups
/// share [`strncmp_eq`]; only the bound passed to it differs.
pub fn exports(image: &Reader, anchor: &Anchor, function_name: &[u8]) -> bool {
    let (export_rva, _size) =
        match crate::pe::header::data_directory(image, &anchor.optional_header, DataDirectoryIndex::Export) {
            Some(d) => d,
            None => return false,
        };
    if export_rva == 0 {
        return false;
    }

    let dir_offset = to_offset(image, anchor, export_rva);
    if dir_offset == 0 || dir_offset >= image.len() {
        return false;
    }

    let number_of_names = match image.u32(dir_offset + EXPORT_DIRECTORY_NUMBER_OF_NAMES_OFFSET) {
        Some(n) => n,
        None => return false,
    };
    let address_of_names = match image.u32(dir_offset + EXPORT_DIRECTORY_ADDRESS_OF_NAMES_OFFSET) {
        Some(a) => a,
        None => return false,
    };

    let names_offset = to_offset(image, anchor, address_of_names);
    let names_table_size = number_of_names as u64 * 4;
    if names_offset == 0 || !image.fits(names_offset, names_table_size) {
        return false;
    }

    for i in 0..number_of_names as u64 {
        let name_rva = match image.u32(names_offset + i * 4) {
            Some(r) => r,
            None => return false,
        };

        let name_offset = to_offset(image, anchor, name_rva);
        if name_offset == 0 || name_offset >= image.len() {
            return false;
        }

        let bound = image.len() - name_offset;
        let name = match image.cstr_bounded(name_offset, bound) {
            Some(n) => n,
            None => return false,
        };

        if strncmp_eq(name, function_name, bound) {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pe::header::get_header;

    fn build_pe_with_export(name: &str) -> Vec<u8> {
        let mut data = vec![0u8; 0x500];
        data[0] = b'M';
        data[1] = b'Z';
        data[0x3c..0x40].copy_from_slice(&0x40u32.to_le_bytes());
        data[0x40..0x44].copy_from_slice(b"PE\0\0");
        data[0x44..0x46].copy_from_slice(&0x14Cu16.to_le_bytes()); // I386
        data[0x46..0x48].copy_from_slice(&1u16.to_le_bytes()); // NumberOfSections
        data[0x54..0x56].copy_from_slice(&0xE0u16.to_le_bytes()); // SizeOfOptionalHeader

        let opt = 0x58usize;
        // DataDirectory[0] (export) at opt+96
        data[opt + 96..opt + 100].copy_from_slice(&0x2000u32.to_le_bytes());
        data[opt + 100..opt + 104].copy_from_slice(&0x40u32.to_le_bytes());

        let sections_offset = opt + 0xE0;
        // one section covering the export data, VA 0x2000 -> raw 0x300
        data[sections_offset..sections_offset + 8].copy_from_slice(b".rdata\0\0");
        data[sections_offset + 12..sections_offset + 16].copy_from_slice(&0x2000u32.to_le_bytes());
        data[sections_offset + 20..sections_offset + 24].copy_from_slice(&0x300u32.to_le_bytes());

        // IMAGE_EXPORT_DIRECTORY at file offset 0x300 (rva 0x2000)
        let export_dir = 0x300usize;
        data[export_dir + 24..export_dir + 28].copy_from_slice(&1u32.to_le_bytes()); // NumberOfNames
        data[export_dir + 32..export_dir + 36].copy_from_slice(&0x2100u32.to_le_bytes()); // AddressOfNames

        // names array at rva 0x2100 -> raw 0x400
        data[0x400..0x404].copy_from_slice(&0x2200u32.to_le_bytes());

        // name string at rva 0x2200 -> raw 0x480
        let name_bytes = name.as_bytes();
        data[0x480..0x480 + name_bytes.len()].copy_from_slice(name_bytes);

        data
    }

    #[test]
    fn finds_exported_name() {
        let data = build_pe_with_export("CreateFileA");
        let reader = Reader::new(&data);
        let anchor = get_header(&reader, 0).expect("valid header");
        assert!(exports(&reader, &anchor, b"CreateFileA"));
        assert!(!exports(&reader, &anchor, b"NotExported"));
    }

    #[test]
    fn longer_stored_name_does_not_match_shorter_query() {
        let data = build_pe_with_export("CreateFileExtra");
        let reader = Reader::new(&data);
        let anchor = get_header(&reader, 0).expect("valid header");
        assert!(!exports(&reader, &anchor, b"CreateFile"));
    }

    #[test]
    fn absent_directory_returns_false() {
        let mut data = vec![0u8; 0x300];
        data[0] = b'M';
        data[1] = b'Z';
        data[0x3c..0x40].copy_from_slice(&0x40u32.to_le_bytes());
        data[0x40..0x44].copy_from_slice(b"PE\0\0");
        data[0x44..0x46].copy_from_slice(&0x14Cu16.to_le_bytes());
        data[0x54..0x56].copy_from_slice(&0xE0u16.to_le_bytes());
        let reader = Reader::new(&data);
        let anchor = get_header(&reader, 0).expect("valid header");
        assert!(!exports(&reader, &anchor, b"anything"));
    }
}
