//! Batched 3D Model container.
//!
//! Layout: 28-byte header, feature table JSON, feature table binary (always
//! empty here), batch table JSON, batch table binary, GLB. Every section
//! ends on an 8-byte boundary.

use bytemuck::{Pod, Zeroable};
use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, TileError};

use super::padding::{pad, pad_from, BINARY_FILL, JSON_FILL, SECTION_ALIGNMENT};

pub const B3DM_MAGIC: [u8; 4] = *b"b3dm";
pub const B3DM_VERSION: u32 = 1;
pub const HEADER_LEN: usize = 28;

/// B3DM file header (28 bytes, little-endian)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct B3dmHeader {
    pub magic: [u8; 4],
    pub version: u32,
    /// Total byte length of the file
    pub byte_length: u32,
    pub feature_table_json_byte_length: u32,
    pub feature_table_binary_byte_length: u32,
    pub batch_table_json_byte_length: u32,
    pub batch_table_binary_byte_length: u32,
}

/// Global feature table semantics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureTable {
    #[serde(rename = "BATCH_LENGTH")]
    pub batch_length: usize,
    #[serde(rename = "RTC_CENTER", skip_serializing_if = "Option::is_none")]
    pub rtc_center: Option<[f64; 3]>,
}

/// Join the feature table, batch table and GLB into one b3dm.
///
/// `batch_table_binary` may be empty, in which case its header length is 0.
pub fn pack_b3dm(
    feature_table: &FeatureTable,
    batch_table_json: &Value,
    batch_table_binary: &[u8],
    glb: &[u8],
) -> Result<Vec<u8>> {
    let ft_json = pad_from(
        &serde_json::to_vec(feature_table)?,
        HEADER_LEN,
        SECTION_ALIGNMENT,
        JSON_FILL,
    );
    let bt_json = pad(
        &serde_json::to_vec(batch_table_json)?,
        SECTION_ALIGNMENT,
        JSON_FILL,
    );
    let bt_bin = pad(batch_table_binary, SECTION_ALIGNMENT, BINARY_FILL);
    let glb = pad(glb, SECTION_ALIGNMENT, BINARY_FILL);

    let total = HEADER_LEN + ft_json.len() + bt_json.len() + bt_bin.len() + glb.len();
    let header = B3dmHeader {
        magic: B3DM_MAGIC,
        version: B3DM_VERSION,
        byte_length: section_len(total, "tile")?,
        feature_table_json_byte_length: section_len(ft_json.len(), "feature table JSON")?,
        feature_table_binary_byte_length: 0,
        batch_table_json_byte_length: section_len(bt_json.len(), "batch table JSON")?,
        batch_table_binary_byte_length: section_len(bt_bin.len(), "batch table binary")?,
    };

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(bytemuck::bytes_of(&header));
    out.extend_from_slice(&ft_json);
    out.extend_from_slice(&bt_json);
    out.extend_from_slice(&bt_bin);
    out.extend_from_slice(&glb);
    Ok(out)
}

fn section_len(len: usize, what: &str) -> Result<u32> {
    u32::try_from(len)
        .map_err(|_| TileError::Output(format!("{what} of {len} bytes exceeds b3dm limits")))
}

/// Read and check the header of a b3dm byte sequence.
pub fn read_header(data: &[u8]) -> Result<B3dmHeader> {
    if data.len() < HEADER_LEN {
        return Err(TileError::Input("b3dm too small for header".into()));
    }
    let header: B3dmHeader = bytemuck::pod_read_unaligned(&data[..HEADER_LEN]);
    if header.magic != B3DM_MAGIC {
        return Err(TileError::Input(format!("invalid magic: {:?}", header.magic)));
    }
    if header.version != B3DM_VERSION {
        return Err(TileError::Input(format!(
            "unsupported b3dm version: {}",
            header.version
        )));
    }
    Ok(header)
}

/// Section slices of a packed b3dm, for inspection.
#[derive(Debug)]
pub struct B3dmSections<'a> {
    pub header: B3dmHeader,
    pub feature_table_json: &'a [u8],
    pub batch_table_json: &'a [u8],
    pub batch_table_binary: &'a [u8],
    pub glb: &'a [u8],
}

/// Split a b3dm into its sections.
pub fn split_sections(data: &[u8]) -> Result<B3dmSections<'_>> {
    let header = read_header(data)?;
    if header.byte_length as usize != data.len() {
        return Err(TileError::Input(format!(
            "byteLength {} does not match {} bytes",
            header.byte_length,
            data.len()
        )));
    }

    let mut offset = HEADER_LEN;
    let feature_table_json = take_section(data, &mut offset, header.feature_table_json_byte_length)?;
    take_section(data, &mut offset, header.feature_table_binary_byte_length)?;
    let batch_table_json = take_section(data, &mut offset, header.batch_table_json_byte_length)?;
    let batch_table_binary =
        take_section(data, &mut offset, header.batch_table_binary_byte_length)?;
    let glb = &data[offset..];

    Ok(B3dmSections {
        header,
        feature_table_json,
        batch_table_json,
        batch_table_binary,
        glb,
    })
}

fn take_section<'a>(data: &'a [u8], offset: &mut usize, len: u32) -> Result<&'a [u8]> {
    let end = *offset + len as usize;
    let slice = data
        .get(*offset..end)
        .ok_or_else(|| TileError::Input("b3dm section exceeds file length".into()))?;
    *offset = end;
    Ok(slice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn feature_table(batch_length: usize) -> FeatureTable {
        FeatureTable {
            batch_length,
            rtc_center: None,
        }
    }

    #[test]
    fn header_fields() {
        let glb = vec![7u8; 20];
        let bytes = pack_b3dm(&feature_table(2), &json!({"name": ["a", "b"]}), &[], &glb).unwrap();

        assert_eq!(&bytes[0..4], b"b3dm");
        let header = read_header(&bytes).unwrap();
        assert_eq!(header.version, 1);
        assert_eq!(header.byte_length as usize, bytes.len());
        assert_eq!(header.feature_table_binary_byte_length, 0);
        assert_eq!(header.batch_table_binary_byte_length, 0);
        assert_eq!(bytes.len() % 8, 0);
    }

    #[test]
    fn sections_are_aligned() {
        let glb = vec![1u8; 13];
        let bytes = pack_b3dm(
            &feature_table(3),
            &json!({"height": [1, 2, 3]}),
            &[1, 2, 3],
            &glb,
        )
        .unwrap();
        let header = read_header(&bytes).unwrap();

        let ft_end = HEADER_LEN + header.feature_table_json_byte_length as usize;
        assert_eq!(ft_end % 8, 0);
        assert_eq!(header.batch_table_json_byte_length % 8, 0);
        assert_eq!(header.batch_table_binary_byte_length, 8);

        let sections = split_sections(&bytes).unwrap();
        assert_eq!(&sections.batch_table_binary[..3], &[1, 2, 3]);
        assert!(sections.batch_table_binary[3..].iter().all(|&b| b == 0));
        assert_eq!(&sections.glb[..13], glb.as_slice());
        assert_eq!(sections.glb.len(), 16);
    }

    #[test]
    fn json_sections_padded_with_spaces() {
        let bytes = pack_b3dm(&feature_table(1), &json!({}), &[], &[]).unwrap();
        let sections = split_sections(&bytes).unwrap();

        let ft = std::str::from_utf8(sections.feature_table_json).unwrap();
        assert!(ft.starts_with(r#"{"BATCH_LENGTH":1}"#));
        assert!(ft[18..].bytes().all(|b| b == b' '));

        let parsed: Value = serde_json::from_slice(sections.feature_table_json).unwrap();
        assert_eq!(parsed["BATCH_LENGTH"], 1);
        assert!(parsed.get("RTC_CENTER").is_none());
    }

    #[test]
    fn rtc_center_written() {
        let table = FeatureTable {
            batch_length: 4,
            rtc_center: Some([1.5, -2.0, 3.25]),
        };
        let bytes = pack_b3dm(&table, &json!({}), &[], &[]).unwrap();
        let sections = split_sections(&bytes).unwrap();
        let parsed: Value = serde_json::from_slice(sections.feature_table_json).unwrap();
        assert_eq!(parsed["RTC_CENTER"], json!([1.5, -2.0, 3.25]));
    }

    #[test]
    fn bad_magic_rejected() {
        let mut bytes = pack_b3dm(&feature_table(1), &json!({}), &[], &[]).unwrap();
        bytes[0] = b'x';
        assert!(matches!(read_header(&bytes), Err(TileError::Input(_))));
        assert!(read_header(&bytes[..10]).is_err());
    }

    #[test]
    fn truncated_file_rejected() {
        let bytes = pack_b3dm(&feature_table(1), &json!({"a": [1]}), &[], &[0; 8]).unwrap();
        assert!(split_sections(&bytes[..bytes.len() - 8]).is_err());
    }
}
