//! Module lifecycle: scans the host's supplied memory blocks for a PE,
//! binds the first acceptable one, and publishes its metadata. At most one
//! binding lives per module.

use crate::error::LoadError;
use crate::pe::image::Image;
use crate::sink::{self, MetadataSink};

/// One of the host's memory blocks: `base` is its runtime virtual address
/// (meaningful only in process-memory scans), `data` its bytes.
#[derive(Clone, Copy)]
pub struct MemoryBlock<'a> {
    pub base: u64,
    pub data: &'a [u8],
}

/// The only scan-mode bit this module inspects. Set when the host is
/// scanning a live process rather than a file on disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanFlags {
    pub process_memory: bool,
}

/// Holds at most one bound image for the lifetime of a scan.
pub struct Module<'a> {
    pub image: Option<Image<'a>>,
}

impl<'a> Module<'a> {
    /// Iterates `blocks` in order, binding the first one whose header
    /// validates. DLLs are skipped when `flags.process_memory` is set,
    /// matching a host that doesn't want every loaded library treated as
    /// the scanned subject. Publishes constants unconditionally and, once
    /// a binding is found, the decoded scalars and section array.
    ///
    /// `Err(LoadError::InsufficientMemory)` models the one real failure
    /// mode: the allocator refuses the (small) binding record.
    pub fn load(
        blocks: &[MemoryBlock<'a>],
        flags: ScanFlags,
        sink: &mut dyn MetadataSink,
    ) -> Result<Self, LoadError> {
        sink::publish_constants(sink);

        for block in blocks {
            let image = match Image::bind(block.data, 0) {
                Some(img) => img,
                None => {
                    log::trace!(
                        "memory block at base {:#x} ({} bytes) is not a recognized PE image",
                        block.base,
                        block.data.len()
                    );
                    continue;
                }
            };

            if flags.process_memory && sink::is_dll(&image) {
                log::debug!(
                    "skipping DLL at base {:#x} while scanning process memory",
                    block.base
                );
                continue;
            }

            // The binding record itself is tiny; this models the single
            // genuine error channel (resource exhaustion) rather than the
            // much larger, infallible `Vec` allocations already performed
            // while decoding sections above.
            let mut record: Vec<u8> = Vec::new();
            record
                .try_reserve(1)
                .map_err(|_| LoadError::InsufficientMemory)?;

            let base_address = if flags.process_memory {
                Some(block.base)
            } else {
                None
            };
            sink::publish_scalars(sink, &image, base_address);
            sink::publish_sections(sink, &image);

            return Ok(Module { image: Some(image) });
        }

        Ok(Module { image: None })
    }

    /// Releases the binding. The backing byte slice is owned by the host
    /// and was never copied; there is nothing left to free beyond `self`.
    pub fn unload(self) {}

    /// `section_index(name)`. [`sink::UNDEFINED`] if nothing is bound.
    pub fn section_index(&self, name: &str) -> i64 {
        match &self.image {
            Some(image) => sink::section_index(image, name),
            None => sink::UNDEFINED,
        }
    }

    /// `exports(function_name)`. [`sink::UNDEFINED`] if nothing is bound.
    pub fn exports(&self, function_name: &str) -> i64 {
        match &self.image {
            Some(image) => sink::query_exports(image, function_name),
            None => sink::UNDEFINED,
        }
    }

    /// `imports(dll_name, function_name)`. [`sink::UNDEFINED`] if nothing is
    /// bound.
    pub fn imports(&self, dll_name: &str, function_name: &str) -> i64 {
        match &self.image {
            Some(image) => sink::query_imports(image, dll_name, function_name),
            None => sink::UNDEFINED,
        }
    }

    /// `language(language_id)`. [`sink::UNDEFINED`] if nothing is bound.
    pub fn language(&self, language_id: i64) -> i64 {
        match &self.image {
            Some(image) => sink::query_language(image, language_id),
            None => sink::UNDEFINED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct RecordingSink {
        integers: HashMap<String, i64>,
    }

    impl MetadataSink for RecordingSink {
        fn set_integer(&mut self, path: &str, value: i64) {
            self.integers.insert(path.to_string(), value);
        }

        fn set_string(&mut self, _path: &str, _value: &str) {}
    }

    fn pe32(characteristics: u16) -> Vec<u8> {
        let mut data = vec![0u8; 0x300];
        data[0] = b'M';
        data[1] = b'Z';
        data[0x3c..0x40].copy_from_slice(&0x40u32.to_le_bytes());
        data[0x40..0x44].copy_from_slice(b"PE\0\0");
        data[0x44..0x46].copy_from_slice(&0x14Cu16.to_le_bytes());
        data[0x54..0x56].copy_from_slice(&0xE0u16.to_le_bytes());
        data[0x56..0x58].copy_from_slice(&characteristics.to_le_bytes());
        data
    }

    #[test]
    fn binds_first_matching_block() {
        let garbage = vec![0u8; 16];
        let pe = pe32(0);
        let blocks = [
            MemoryBlock {
                base: 0,
                data: &garbage,
            },
            MemoryBlock {
                base: 0x400000,
                data: &pe,
            },
        ];
        let mut sink = RecordingSink::default();
        let module = Module::load(&blocks, ScanFlags::default(), &mut sink).expect("loads");
        assert!(module.image.is_some());
        assert_eq!(sink.integers["machine"], 0x014c);
    }

    #[test]
    fn skips_dll_when_scanning_process_memory() {
        // IMAGE_FILE_DLL = 0x2000
        let dll = pe32(0x2000);
        let blocks = [MemoryBlock {
            base: 0x10000000,
            data: &dll,
        }];
        let flags = ScanFlags {
            process_memory: true,
        };
        let mut sink = RecordingSink::default();
        let module = Module::load(&blocks, flags, &mut sink).expect("loads");
        assert!(module.image.is_none());
    }

    #[test]
    fn no_matching_block_leaves_module_unbound() {
        let garbage = vec![0u8; 16];
        let blocks = [MemoryBlock {
            base: 0,
            data: &garbage,
        }];
        let mut sink = RecordingSink::default();
        let module = Module::load(&blocks, ScanFlags::default(), &mut sink).expect("loads");
        assert!(module.image.is_none());
    }

    #[test]
    fn unbound_module_reports_undefined_for_every_query() {
        let mut sink = RecordingSink::default();
        let module = Module::load(&[], ScanFlags::default(), &mut sink).expect("loads");
        assert!(module.image.is_none());

        assert_eq!(module.section_index(".text"), crate::sink::UNDEFINED);
        assert_eq!(module.exports("CreateFileA"), crate::sink::UNDEFINED);
        assert_eq!(
            module.imports("kernel32.dll", "CreateFileA"),
            crate::sink::UNDEFINED
        );
        assert_eq!(module.language(0x409), crate::sink::UNDEFINED);
    }
}
