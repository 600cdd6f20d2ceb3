//! Section table decoding and RVA→file-offset translation.

use crate::pe::util::SectionName;
use crate::reader::Reader;

/// Hard cap on the number of sections we'll ever enumerate, independent of
/// what `NumberOfSections` claims. A deliberate guard against a crafted
/// count driving unbounded work; do not raise it to match the nominal
/// 16-bit field width.
pub const MAX_SECTIONS: usize = 96;

const SECTION_HEADER_SIZE: u64 = 40;

#[derive(Debug, Clone, Copy)]
pub struct SectionRecord {
    pub name: [u8; 8],
    pub characteristics: u32,
    pub virtual_address: u32,
    pub virtual_size: u32,
    pub raw_data_offset: u32,
    pub raw_data_size: u32,
}

impl SectionRecord {
    pub fn name_str(&self) -> String {
        SectionName::trimmed(&self.name)
    }
}

/// Walks the section table starting immediately after the optional header,
/// stopping at the first header whose footprint would exceed `pe_size` or
/// at [`MAX_SECTIONS`], whichever comes first. `pe_size` is measured from
/// `nt_offset` (see [`crate::pe::header::Anchor`]), not from the start of
/// the whole slice.
pub fn read_sections(
    image: &Reader,
    nt_offset: u64,
    pe_size: u64,
    section_table_offset: u64,
    number_of_sections: u16,
) -> Vec<SectionRecord> {
    let mut sections = Vec::new();
    let count = (number_of_sections as usize).min(MAX_SECTIONS);

    for i in 0..count {
        let header_offset = match section_table_offset.checked_add(i as u64 * SECTION_HEADER_SIZE)
        {
            Some(o) => o,
            None => break,
        };

        // Relative to the NT header anchor, matching the original's
        // `(uint8_t*)section - (uint8_t*)pe + sizeof(...) < pe_size` check.
        let relative_end = match header_offset
            .checked_add(SECTION_HEADER_SIZE)
            .and_then(|end| end.checked_sub(nt_offset))
        {
            Some(r) => r,
            None => break,
        };
        if relative_end >= pe_size {
            break;
        }

        let record = match read_one_section(image, header_offset) {
            Some(r) => r,
            None => break,
        };
        sections.push(record);
    }

    sections
}

fn read_one_section(image: &Reader, offset: u64) -> Option<SectionRecord> {
    let name_slice = image.slice(offset, 8)?;
    let mut name = [0u8; 8];
    name.copy_from_slice(name_slice);

    let virtual_size = image.u32(offset + 8)?;
    let virtual_address = image.u32(offset + 12)?;
    let raw_data_size = image.u32(offset + 16)?;
    let raw_data_offset = image.u32(offset + 20)?;
    let characteristics = image.u32(offset + 36)?;

    Some(SectionRecord {
        name,
        characteristics,
        virtual_address,
        virtual_size,
        raw_data_offset,
        raw_data_size,
    })
}

/// Translates an RVA to a file offset by scanning every section (up to the
/// cap) and adopting the highest `VirtualAddress` that is `<= rva`. This
/// deliberately does not stop at the first *enclosing* section — sections
/// aren't guaranteed sorted in the file, so the loop keeps scanning and
/// keeps whichever matching section header comes out on top by address,
/// regardless of where it sits in the table. Returns `0` — the "not
/// mapped" sentinel — if the section table would overflow the buffer
/// during the walk.
pub fn rva_to_offset(
    image: &Reader,
    nt_offset: u64,
    pe_size: u64,
    section_table_offset: u64,
    number_of_sections: u16,
    rva: u32,
) -> u64 {
    let rva = rva as u64;
    let count = (number_of_sections as usize).min(MAX_SECTIONS);

    let mut best_section_rva: u64 = 0;
    let mut best_section_offset: u64 = 0;

    for i in 0..count {
        let header_offset = match section_table_offset.checked_add(i as u64 * SECTION_HEADER_SIZE)
        {
            Some(o) => o,
            None => return 0,
        };
        let relative_end = match header_offset
            .checked_add(SECTION_HEADER_SIZE)
            .and_then(|end| end.checked_sub(nt_offset))
        {
            Some(r) => r,
            None => return 0,
        };
        if relative_end >= pe_size {
            return 0;
        }

        let virtual_address = match image.u32(header_offset + 12) {
            Some(v) => v as u64,
            None => return 0,
        };
        let raw_data_offset = match image.u32(header_offset + 20) {
            Some(v) => v as u64,
            None => return 0,
        };

        if rva >= virtual_address && virtual_address >= best_section_rva {
            best_section_rva = virtual_address;
            best_section_offset = raw_data_offset;
        }
    }

    best_section_offset + (rva - best_section_rva)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section_bytes(
        name: &[u8; 8],
        virtual_size: u32,
        virtual_address: u32,
        raw_size: u32,
        raw_offset: u32,
        characteristics: u32,
    ) -> [u8; 40] {
        let mut buf = [0u8; 40];
        buf[0..8].copy_from_slice(name);
        buf[8..12].copy_from_slice(&virtual_size.to_le_bytes());
        buf[12..16].copy_from_slice(&virtual_address.to_le_bytes());
        buf[16..20].copy_from_slice(&raw_size.to_le_bytes());
        buf[20..24].copy_from_slice(&raw_offset.to_le_bytes());
        buf[36..40].copy_from_slice(&characteristics.to_le_bytes());
        buf
    }

    #[test]
    fn reads_single_section_and_maps_rva() {
        let mut data = vec![0u8; 0x300];
        let sec = section_bytes(b"Test\0\0\0\0", 0x50, 0x1000, 0x100, 0x200, 0);
        data[0..40].copy_from_slice(&sec);
        let reader = Reader::new(&data);

        let sections = read_sections(&reader, 0, data.len() as u64, 0, 1);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].name_str(), "Test");

        let offset = rva_to_offset(&reader, 0, data.len() as u64, 0, 1, 0x1000);
        assert_eq!(offset, 0x200);

        let offset = rva_to_offset(&reader, 0, data.len() as u64, 0, 1, 0x1010);
        assert_eq!(offset, 0x210);
    }

    #[test]
    fn caps_at_max_sections() {
        let mut data = vec![0u8; 200 * 40 + 16];
        for i in 0..200u32 {
            let sec = section_bytes(b"S\0\0\0\0\0\0\0", 0, i, 0, 0, 0);
            let start = (i as usize) * 40;
            data[start..start + 40].copy_from_slice(&sec);
        }
        let reader = Reader::new(&data);
        let sections = read_sections(&reader, 0, data.len() as u64, 0, 200);
        assert_eq!(sections.len(), MAX_SECTIONS);
    }

    #[test]
    fn truncated_table_yields_zero_offset() {
        let data = vec![0u8; 30]; // shorter than one section header
        let reader = Reader::new(&data);
        let sections = read_sections(&reader, 0, data.len() as u64, 0, 1);
        assert!(sections.is_empty());
        let offset = rva_to_offset(&reader, 0, data.len() as u64, 0, 1, 0x10);
        assert_eq!(offset, 0);
    }
}
