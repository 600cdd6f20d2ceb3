//! Bounds-checked typed views into a borrowed byte slice.
//!
//! Every read here crosses an adversarial trust boundary: offsets and counts
//! come from the file itself. No read ever trusts a length or count field
//! without first bounding it against what remains of the slice, and all
//! arithmetic is carried out in `u64` so it cannot wrap at the domain of
//! inputs we actually see (offsets derived from `u32` fields).

use nom::number::complete::{le_u16, le_u32, le_u64, le_u8};

/// A read-only view over a byte slice that never panics and never reads
/// outside its bounds, regardless of what offsets callers ask for.
#[derive(Clone, Copy)]
pub struct Reader<'a> {
    data: &'a [u8],
}

/// `ptr + sizeof(T) <= end`, computed without risk of overflow.
fn fits(ptr: u64, size: u64, end: u64) -> bool {
    match ptr.checked_add(size) {
        Some(limit) => limit <= end,
        None => false,
    }
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Reader { data }
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &'a [u8] {
        self.data
    }

    /// Returns `true` iff `offset .. offset+size` lies entirely within this
    /// reader's slice.
    pub fn fits(&self, offset: u64, size: u64) -> bool {
        fits(offset, size, self.len())
    }

    pub fn u8(&self, offset: u64) -> Option<u8> {
        let slice = self.slice(offset, 1)?;
        let (_, v) = le_u8::<_, nom::error::Error<&[u8]>>(slice).ok()?;
        Some(v)
    }

    pub fn u16(&self, offset: u64) -> Option<u16> {
        let slice = self.slice(offset, 2)?;
        let (_, v) = le_u16::<_, nom::error::Error<&[u8]>>(slice).ok()?;
        Some(v)
    }

    pub fn u32(&self, offset: u64) -> Option<u32> {
        let slice = self.slice(offset, 4)?;
        let (_, v) = le_u32::<_, nom::error::Error<&[u8]>>(slice).ok()?;
        Some(v)
    }

    pub fn u64(&self, offset: u64) -> Option<u64> {
        let slice = self.slice(offset, 8)?;
        let (_, v) = le_u64::<_, nom::error::Error<&[u8]>>(slice).ok()?;
        Some(v)
    }

    /// A bounds-checked sub-slice of exactly `len` bytes starting at `offset`.
    pub fn slice(&self, offset: u64, len: u64) -> Option<&'a [u8]> {
        if !self.fits(offset, len) {
            return None;
        }
        let start = offset as usize;
        let end = start + len as usize;
        Some(&self.data[start..end])
    }

    /// A NUL-terminated byte string starting at `offset`, not scanning past
    /// `offset + max_len` (or the end of the slice, whichever comes first).
    /// Returns the bytes *not* including the terminator. `None` if `offset`
    /// itself is out of bounds.
    pub fn cstr_bounded(&self, offset: u64, max_len: u64) -> Option<&'a [u8]> {
        if offset > self.len() {
            return None;
        }
        let start = offset as usize;
        let remaining = self.len() - offset;
        let scan_len = remaining.min(max_len) as usize;
        let window = &self.data[start..start + scan_len];
        let end = window.iter().position(|&b| b == 0).unwrap_or(window.len());
        Some(&window[..end])
    }
}
