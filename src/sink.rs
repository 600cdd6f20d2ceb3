//! Publishes decoded PE metadata into the host's path-addressed object tree
//! and dispatches the query functions a rule author calls against it.
//!
//! The host's object model is a tree reached by dotted, `%i`-indexed paths
//! (`"sections[2].name"`). We model that as a trait over the sink rather
//! than reflecting into some concrete struct, since the host's query
//! language is itself path-based.

use crate::pe::constants::{self, Characteristics};
use crate::pe::exports;
use crate::pe::image::Image;
use crate::pe::imports;
use crate::pe::resources::{self, WalkControl};

/// Distinct from any integer a query can legitimately return. Returned when
/// a precondition (a binding present, a field readable) isn't met.
pub const UNDEFINED: i64 = i64::MIN;

/// A host object tree reachable by path. `set_integer`/`set_string` are the
/// only two value kinds this module ever publishes.
pub trait MetadataSink {
    fn set_integer(&mut self, path: &str, value: i64);
    fn set_string(&mut self, path: &str, value: &str);
}

/// Publishes the machine, subsystem and characteristics constants. These
/// never depend on whether a PE is bound; a host calls this once at
/// module-load regardless of outcome.
pub fn publish_constants(sink: &mut dyn MetadataSink) {
    sink.set_integer("MACHINE_I386", constants::MACHINE_I386);
    sink.set_integer("MACHINE_AMD64", constants::MACHINE_AMD64);

    sink.set_integer("SUBSYSTEM_UNKNOWN", constants::SUBSYSTEM_UNKNOWN);
    sink.set_integer("SUBSYSTEM_NATIVE", constants::SUBSYSTEM_NATIVE);
    sink.set_integer("SUBSYSTEM_WINDOWS_GUI", constants::SUBSYSTEM_WINDOWS_GUI);
    sink.set_integer("SUBSYSTEM_WINDOWS_CUI", constants::SUBSYSTEM_WINDOWS_CUI);
    sink.set_integer("SUBSYSTEM_OS2_CUI", constants::SUBSYSTEM_OS2_CUI);
    sink.set_integer("SUBSYSTEM_POSIX_CUI", constants::SUBSYSTEM_POSIX_CUI);
    sink.set_integer(
        "SUBSYSTEM_NATIVE_WINDOWS",
        constants::SUBSYSTEM_NATIVE_WINDOWS,
    );

    for (path, flag) in constants::CHARACTERISTICS_PATHS {
        sink.set_integer(path, flag.bits() as i64);
    }
}

/// Publishes the scalar header fields, including the entry point resolved
/// for the host's scan mode (`base_address` is `Some` only when scanning a
/// live process).
pub fn publish_scalars(sink: &mut dyn MetadataSink, image: &Image, base_address: Option<u64>) {
    let file_header = &image.anchor.file_header;
    let optional_header = &image.anchor.optional_header;

    sink.set_integer("machine", file_header.machine.as_u16() as i64);
    sink.set_integer("number_of_sections", file_header.number_of_sections as i64);
    sink.set_integer("timestamp", file_header.timestamp as i64);
    sink.set_integer("characteristics", file_header.characteristics as i64);

    sink.set_integer("entry_point", image.entry_point(base_address) as i64);
    sink.set_integer("image_base", optional_header.image_base as i64);

    sink.set_integer(
        "linker_version.major",
        optional_header.major_linker_version as i64,
    );
    sink.set_integer(
        "linker_version.minor",
        optional_header.minor_linker_version as i64,
    );
    sink.set_integer("os_version.major", optional_header.major_os_version as i64);
    sink.set_integer("os_version.minor", optional_header.minor_os_version as i64);
    sink.set_integer(
        "image_version.major",
        optional_header.major_image_version as i64,
    );
    sink.set_integer(
        "image_version.minor",
        optional_header.minor_image_version as i64,
    );
    sink.set_integer(
        "subsystem_version.major",
        optional_header.major_subsystem_version as i64,
    );
    sink.set_integer(
        "subsystem_version.minor",
        optional_header.minor_subsystem_version as i64,
    );
    sink.set_integer("subsystem", optional_header.subsystem as i64);
}

/// Publishes the section array. Truncated to whatever [`Image::bind`]
/// already decoded — at most 96 entries, fewer if the table overran the
/// buffer partway through.
pub fn publish_sections(sink: &mut dyn MetadataSink, image: &Image) {
    for (i, section) in image.sections.iter().enumerate() {
        sink.set_string(&format!("sections[{}].name", i), &section.name_str());
        sink.set_integer(
            &format!("sections[{}].characteristics", i),
            section.characteristics as i64,
        );
        sink.set_integer(
            &format!("sections[{}].virtual_address", i),
            section.virtual_address as i64,
        );
        sink.set_integer(
            &format!("sections[{}].virtual_size", i),
            section.virtual_size as i64,
        );
        sink.set_integer(
            &format!("sections[{}].raw_data_offset", i),
            section.raw_data_offset as i64,
        );
        sink.set_integer(
            &format!("sections[{}].raw_data_size", i),
            section.raw_data_size as i64,
        );
    }
}

/// `section_index(name) -> index`. [`UNDEFINED`] if no section with that
/// name exists.
pub fn section_index(image: &Image, name: &str) -> i64 {
    for (i, section) in image.sections.iter().enumerate() {
        if section.name_str() == name {
            return i as i64;
        }
    }
    UNDEFINED
}

/// `exports(function_name) -> {0, 1}`.
pub fn query_exports(image: &Image, function_name: &str) -> i64 {
    i64::from(exports::exports(
        &image.reader(),
        &image.anchor,
        function_name.as_bytes(),
    ))
}

/// `imports(dll_name, function_name) -> {0, 1}`.
pub fn query_imports(image: &Image, dll_name: &str, function_name: &str) -> i64 {
    i64::from(imports::imports(
        &image.reader(),
        &image.anchor,
        dll_name.as_bytes(),
        function_name.as_bytes(),
    ))
}

/// `language(language_id) -> {0, 1, UNDEFINED}`. `UNDEFINED` iff the
/// resource directory itself is absent or malformed, distinct from "present
/// but no leaf carries that language".
pub fn query_language(image: &Image, language_id: i64) -> i64 {
    let root = match image.resource_root() {
        Some(r) => r,
        None => return UNDEFINED,
    };

    let mut found = false;
    let mut visitor = |_type: i32, _id: i32, language: i32| {
        if language as i64 == language_id {
            found = true;
            WalkControl::Abort
        } else {
            WalkControl::Continue
        }
    };
    resources::iterate_resources(&image.reader(), root, &mut visitor);

    i64::from(found)
}

/// Whether this image's `Characteristics` marks it as a DLL.
pub fn is_dll(image: &Image) -> bool {
    image.anchor.file_header.characteristics as u32 & Characteristics::DLL.bits() != 0
}
