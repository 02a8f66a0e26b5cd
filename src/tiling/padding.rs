//! Byte alignment helpers shared by every binary producer.

/// Fill byte for regions that may be read as JSON text.
pub const JSON_FILL: u8 = b' ';
/// Fill byte for binary regions.
pub const BINARY_FILL: u8 = 0;
/// Section alignment required by the b3dm container.
pub const SECTION_ALIGNMENT: usize = 8;

/// Number of fill bytes needed so that `start + len` lands on `boundary`.
pub fn padding_len(start: usize, len: usize, boundary: usize) -> usize {
    (boundary - (start + len) % boundary) % boundary
}

/// Return `bytes` padded to a multiple of `boundary` with `fill`.
pub fn pad(bytes: &[u8], boundary: usize, fill: u8) -> Vec<u8> {
    pad_from(bytes, 0, boundary, fill)
}

/// Like [`pad`], for a region that will be written at byte offset `start`.
pub fn pad_from(bytes: &[u8], start: usize, boundary: usize, fill: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + boundary);
    out.extend_from_slice(bytes);
    pad_in_place(&mut out, start, boundary, fill);
    out
}

/// Append fill bytes to `bytes` until `start + bytes.len()` is aligned.
pub fn pad_in_place(bytes: &mut Vec<u8>, start: usize, boundary: usize, fill: u8) {
    let n = padding_len(start, bytes.len(), boundary);
    bytes.resize(bytes.len() + n, fill);
}
