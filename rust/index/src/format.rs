//! The `.dumb_index` container.
//!
//! ```text
//! Header (37 bytes, little-endian):
//!   u32 magic = 0xFEEDFACE
//!   u32 version = 1
//!   u32 num_dimensions
//!   u8  vector_type
//!   u32 num_paths
//!   u32 num_files
//!   u32 num_tuples
//!   u32 path_table_bytes
//!   u32 file_table_bytes
//!   u32 tuple_table_bytes
//! Path table:  num_paths  x { u32 len; utf8[len] }
//! File table:  num_files  x { u32 path_index; u32 len; utf8[len] }
//! Tuple table: num_tuples x { num_dimensions x encoded value; u32 file_index; u32 position }
//! ```
//!
//! Sections are concatenated without padding. The dimension mask is not part
//! of the container.

use bytes::{Buf, BufMut};
use dumbvec_error::{DumbvecError, ErrorCodes};
use dumbvec_types::{DumbIndex, FileEntry, IndexEntry, Reference};
use thiserror::Error;

use crate::codec::{decode_from, encode_into, CodecError, VectorType};

pub const MAGIC: u32 = 0xFEEDFACE;
pub const FORMAT_VERSION: u32 = 1;
pub const HEADER_LEN: usize = 37;

/// Bytes per tuple besides the vector: file index and position.
const TUPLE_REFERENCE_LEN: u64 = 8;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormatError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("Corrupt index container: {0}")]
    CorruptFormat(String),
    #[error("Unsupported index container version {0}, expected {FORMAT_VERSION}")]
    UnsupportedVersion(u32),
    #[error("Index is too large for the container: {0}")]
    TooLarge(String),
}

impl DumbvecError for FormatError {
    fn code(&self) -> ErrorCodes {
        match self {
            FormatError::Codec(e) => e.code(),
            FormatError::CorruptFormat(_) => ErrorCodes::DataLoss,
            FormatError::UnsupportedVersion(_) => ErrorCodes::VersionMismatch,
            FormatError::TooLarge(_) => ErrorCodes::OutOfRange,
        }
    }
}

fn corrupt(msg: impl Into<String>) -> FormatError {
    FormatError::CorruptFormat(msg.into())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexHeader {
    pub version: u32,
    pub num_dimensions: u32,
    pub vector_type: VectorType,
    pub num_paths: u32,
    pub num_files: u32,
    pub num_tuples: u32,
    pub path_table_bytes: u32,
    pub file_table_bytes: u32,
    pub tuple_table_bytes: u32,
}

impl IndexHeader {
    /// Bytes per tuple, or `None` if the header's counts overflow.
    pub fn tuple_len(&self) -> Option<u64> {
        (self.num_dimensions as u64)
            .checked_mul(self.vector_type.width() as u64)?
            .checked_add(TUPLE_REFERENCE_LEN)
    }

    /// Bytes the tuple table must hold, or `None` if the header's counts
    /// overflow.
    pub fn expected_tuple_table_bytes(&self) -> Option<u64> {
        self.tuple_len()?.checked_mul(self.num_tuples as u64)
    }

    /// Size of the whole container this header describes.
    pub fn total_len(&self) -> u64 {
        HEADER_LEN as u64
            + self.path_table_bytes as u64
            + self.file_table_bytes as u64
            + self.tuple_table_bytes as u64
    }

    fn write(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(MAGIC);
        buf.put_u32_le(self.version);
        buf.put_u32_le(self.num_dimensions);
        buf.put_u8(self.vector_type.code());
        buf.put_u32_le(self.num_paths);
        buf.put_u32_le(self.num_files);
        buf.put_u32_le(self.num_tuples);
        buf.put_u32_le(self.path_table_bytes);
        buf.put_u32_le(self.file_table_bytes);
        buf.put_u32_le(self.tuple_table_bytes);
    }
}

/// Parses and validates the header at the front of `bytes` without decoding
/// any table.
pub fn read_header(bytes: &[u8]) -> Result<IndexHeader, FormatError> {
    if bytes.len() < HEADER_LEN {
        return Err(corrupt(format!(
            "{} bytes is shorter than the {HEADER_LEN} byte header",
            bytes.len()
        )));
    }
    let mut buf = &bytes[..HEADER_LEN];
    let magic = buf.get_u32_le();
    if magic != MAGIC {
        return Err(corrupt(format!("bad magic number {magic:#010x}")));
    }
    let version = buf.get_u32_le();
    if version != FORMAT_VERSION {
        return Err(FormatError::UnsupportedVersion(version));
    }
    let num_dimensions = buf.get_u32_le();
    let vector_type = VectorType::try_from(buf.get_u8())?;
    Ok(IndexHeader {
        version,
        num_dimensions,
        vector_type,
        num_paths: buf.get_u32_le(),
        num_files: buf.get_u32_le(),
        num_tuples: buf.get_u32_le(),
        path_table_bytes: buf.get_u32_le(),
        file_table_bytes: buf.get_u32_le(),
        tuple_table_bytes: buf.get_u32_le(),
    })
}

fn to_u32(value: usize, what: &str) -> Result<u32, FormatError> {
    u32::try_from(value).map_err(|_| FormatError::TooLarge(format!("{what} is {value}")))
}

fn put_string(buf: &mut Vec<u8>, value: &str) -> Result<(), FormatError> {
    buf.put_u32_le(to_u32(value.len(), "string length")?);
    buf.put_slice(value.as_bytes());
    Ok(())
}

/// Serializes `index`, encoding every dimension as `vector_type`.
pub fn serialize(index: &DumbIndex, vector_type: VectorType) -> Result<Vec<u8>, FormatError> {
    let mut path_table = Vec::new();
    for path in index.paths() {
        put_string(&mut path_table, path)?;
    }

    let mut file_table = Vec::new();
    for file in index.files() {
        file_table.put_u32_le(file.path_index);
        put_string(&mut file_table, &file.name)?;
    }

    let tuple_len = index.dimensions() * vector_type.width() + TUPLE_REFERENCE_LEN as usize;
    let mut tuple_table = Vec::with_capacity(tuple_len * index.len());
    for entry in index.entries() {
        for value in &entry.vector {
            encode_into(*value as f64, vector_type, &mut tuple_table)?;
        }
        tuple_table.put_u32_le(entry.reference.file_index);
        tuple_table.put_u32_le(entry.reference.position);
    }

    let header = IndexHeader {
        version: FORMAT_VERSION,
        num_dimensions: to_u32(index.dimensions(), "dimension count")?,
        vector_type,
        num_paths: to_u32(index.paths().len(), "path count")?,
        num_files: to_u32(index.files().len(), "file count")?,
        num_tuples: to_u32(index.len(), "tuple count")?,
        path_table_bytes: to_u32(path_table.len(), "path table size")?,
        file_table_bytes: to_u32(file_table.len(), "file table size")?,
        tuple_table_bytes: to_u32(tuple_table.len(), "tuple table size")?,
    };

    let mut out =
        Vec::with_capacity(HEADER_LEN + path_table.len() + file_table.len() + tuple_table.len());
    header.write(&mut out);
    out.extend_from_slice(&path_table);
    out.extend_from_slice(&file_table);
    out.extend_from_slice(&tuple_table);
    Ok(out)
}

fn get_u32(buf: &mut &[u8], what: &str) -> Result<u32, FormatError> {
    if buf.remaining() < 4 {
        return Err(corrupt(format!("truncated {what}")));
    }
    Ok(buf.get_u32_le())
}

fn get_string(buf: &mut &[u8], what: &str) -> Result<String, FormatError> {
    let len = get_u32(buf, what)? as usize;
    if buf.remaining() < len {
        return Err(corrupt(format!("truncated {what}")));
    }
    let data: &[u8] = *buf;
    let (raw, rest) = data.split_at(len);
    let value = std::str::from_utf8(raw)
        .map_err(|e| corrupt(format!("{what} is not valid utf-8: {e}")))?
        .to_string();
    *buf = rest;
    Ok(value)
}

/// Parses a container produced by [`serialize`]. Any inconsistency between
/// the header and the tables is reported as `CorruptFormat`.
pub fn deserialize(bytes: &[u8]) -> Result<DumbIndex, FormatError> {
    let header = read_header(bytes)?;
    if header.total_len() != bytes.len() as u64 {
        return Err(corrupt(format!(
            "header describes {} bytes but the container has {}",
            header.total_len(),
            bytes.len()
        )));
    }
    if header.expected_tuple_table_bytes() != Some(header.tuple_table_bytes as u64) {
        return Err(corrupt(format!(
            "{} tuples of {} dimensions do not fill a {} byte tuple table",
            header.num_tuples, header.num_dimensions, header.tuple_table_bytes
        )));
    }
    // Every path costs at least a length prefix, every file two u32s.
    if header.num_paths as u64 * 4 > header.path_table_bytes as u64
        || header.num_files as u64 * 8 > header.file_table_bytes as u64
    {
        return Err(corrupt("table counts exceed table sizes"));
    }

    let body = &bytes[HEADER_LEN..];
    let (mut path_table, body) = body.split_at(header.path_table_bytes as usize);
    let (mut file_table, mut tuple_table) = body.split_at(header.file_table_bytes as usize);

    let mut paths = Vec::with_capacity(header.num_paths as usize);
    for _ in 0..header.num_paths {
        paths.push(get_string(&mut path_table, "path table")?);
    }
    if path_table.has_remaining() {
        return Err(corrupt("trailing bytes in path table"));
    }

    let mut files = Vec::with_capacity(header.num_files as usize);
    for _ in 0..header.num_files {
        let path_index = get_u32(&mut file_table, "file table")?;
        let name = get_string(&mut file_table, "file table")?;
        files.push(FileEntry { path_index, name });
    }
    if file_table.has_remaining() {
        return Err(corrupt("trailing bytes in file table"));
    }

    let dimensions = header.num_dimensions as usize;
    let mut entries = Vec::with_capacity(header.num_tuples as usize);
    for _ in 0..header.num_tuples {
        let mut vector = Vec::with_capacity(dimensions);
        for _ in 0..dimensions {
            vector.push(decode_from(&mut tuple_table, header.vector_type)? as f32);
        }
        let file_index = get_u32(&mut tuple_table, "tuple table")?;
        let position = get_u32(&mut tuple_table, "tuple table")?;
        entries.push(IndexEntry {
            vector,
            reference: Reference {
                file_index,
                position,
            },
        });
    }

    DumbIndex::try_new(dimensions, paths, files, entries).map_err(|e| corrupt(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_index() -> DumbIndex {
        DumbIndex::try_new(
            3,
            vec!["corpus/a".to_string(), "corpus/b".to_string()],
            vec![
                FileEntry {
                    path_index: 0,
                    name: "0.json".to_string(),
                },
                FileEntry {
                    path_index: 1,
                    name: "1.json".to_string(),
                },
            ],
            (0..10)
                .map(|i| IndexEntry {
                    vector: vec![1.0 / (i as f32 + 1.0); 3],
                    reference: Reference {
                        file_index: (i % 2) as u32,
                        position: i as u32,
                    },
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_layout() {
        let index = sample_index();
        let bytes = serialize(&index, VectorType::Float32).unwrap();
        let paths_len = 2 * (4 + "corpus/a".len());
        let files_len = 2 * (8 + "0.json".len());
        let tuples_len = 10 * (3 * 4 + 8);
        assert_eq!(bytes.len(), HEADER_LEN + paths_len + files_len + tuples_len);
        assert_eq!(&bytes[0..4], &0xFEEDFACEu32.to_le_bytes());
        assert_eq!(&bytes[4..8], &1u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &3u32.to_le_bytes());
        assert_eq!(bytes[12], 0);

        let header = read_header(&bytes).unwrap();
        assert_eq!(header.num_paths, 2);
        assert_eq!(header.num_files, 2);
        assert_eq!(header.num_tuples, 10);
        assert_eq!(header.path_table_bytes as usize, paths_len);
        assert_eq!(header.file_table_bytes as usize, files_len);
        assert_eq!(header.tuple_table_bytes as usize, tuples_len);
    }

    #[test]
    fn test_lossless_round_trip() {
        let index = sample_index();
        for vector_type in [VectorType::Float32, VectorType::Float64] {
            let bytes = serialize(&index, vector_type).unwrap();
            assert_eq!(deserialize(&bytes).unwrap(), index);
        }
    }

    #[test]
    fn test_quantized_round_trip_is_close() {
        let (dimensions, paths, files, mut entries) = sample_index().into_parts();
        // Cover both ends of the range so the unsigned bias is exercised.
        entries[0].vector = vec![-1.0, 0.0, 1.0];
        entries[1].vector = vec![-0.75, -0.001, 0.999];
        let index = DumbIndex::try_new(dimensions, paths, files, entries).unwrap();

        for vector_type in [
            VectorType::Int8,
            VectorType::Int16,
            VectorType::Int32,
            VectorType::Uint8,
            VectorType::Uint16,
            VectorType::Uint32,
        ] {
            let tolerance = 1.0 / vector_type.scale().unwrap() + 1e-6;
            let bytes = serialize(&index, vector_type).unwrap();
            let decoded = deserialize(&bytes).unwrap();
            assert_eq!(decoded.paths(), index.paths());
            assert_eq!(decoded.files(), index.files());
            for (a, b) in decoded.entries().iter().zip(index.entries()) {
                assert_eq!(a.reference, b.reference);
                for (x, y) in a.vector.iter().zip(&b.vector) {
                    assert!(
                        ((x - y).abs() as f64) <= tolerance,
                        "{vector_type}: {x} vs {y}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_overflowing_header_counts_are_corrupt() {
        let mut bytes = Vec::with_capacity(HEADER_LEN);
        bytes.put_u32_le(MAGIC);
        bytes.put_u32_le(FORMAT_VERSION);
        bytes.put_u32_le((1 << 30) - 1);
        bytes.put_u8(VectorType::Float64.code());
        bytes.put_u32_le(0);
        bytes.put_u32_le(0);
        bytes.put_u32_le(1 << 31);
        bytes.put_u32_le(0);
        bytes.put_u32_le(0);
        bytes.put_u32_le(0);
        assert_eq!(bytes.len(), HEADER_LEN);

        let header = read_header(&bytes).unwrap();
        assert_eq!(header.expected_tuple_table_bytes(), None);
        assert!(matches!(
            deserialize(&bytes).unwrap_err(),
            FormatError::CorruptFormat(_)
        ));
    }

    #[test]
    fn test_serialize_rejects_out_of_range_values() {
        let index = DumbIndex::try_new(
            1,
            vec!["p".to_string()],
            vec![FileEntry {
                path_index: 0,
                name: "f.json".to_string(),
            }],
            vec![IndexEntry {
                vector: vec![1.5],
                reference: Reference {
                    file_index: 0,
                    position: 0,
                },
            }],
        )
        .unwrap();
        let err = serialize(&index, VectorType::Float32).unwrap_err();
        assert!(matches!(
            err,
            FormatError::Codec(CodecError::ValueOutOfRange { .. })
        ));
    }

    #[test]
    fn test_empty_index_round_trip() {
        let index = DumbIndex::default();
        let bytes = serialize(&index, VectorType::Float32).unwrap();
        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(deserialize(&bytes).unwrap(), index);
    }

    #[test]
    fn test_bad_magic_and_version() {
        let mut bytes = serialize(&sample_index(), VectorType::Float32).unwrap();
        let mut wrong_version = bytes.clone();
        wrong_version[4..8].copy_from_slice(&2u32.to_le_bytes());
        assert_eq!(
            deserialize(&wrong_version).unwrap_err(),
            FormatError::UnsupportedVersion(2)
        );
        bytes[0] = 0;
        let err = deserialize(&bytes).unwrap_err();
        assert!(matches!(err, FormatError::CorruptFormat(_)));
        assert_eq!(err.code(), ErrorCodes::DataLoss);
    }

    #[test]
    fn test_unknown_vector_type() {
        let mut bytes = serialize(&sample_index(), VectorType::Float32).unwrap();
        bytes[12] = 3;
        assert_eq!(
            deserialize(&bytes).unwrap_err(),
            FormatError::Codec(CodecError::UnsupportedType(3))
        );
    }

    #[test]
    fn test_inconsistent_tables_are_corrupt() {
        let bytes = serialize(&sample_index(), VectorType::Float32).unwrap();

        // Truncated anywhere.
        for len in [0, 10, HEADER_LEN, bytes.len() - 1] {
            assert!(matches!(
                deserialize(&bytes[..len]).unwrap_err(),
                FormatError::CorruptFormat(_)
            ));
        }

        // Tuple count that disagrees with the tuple table size.
        let mut wrong_count = bytes.clone();
        wrong_count[21..25].copy_from_slice(&11u32.to_le_bytes());
        assert!(matches!(
            deserialize(&wrong_count).unwrap_err(),
            FormatError::CorruptFormat(_)
        ));

        // A tuple pointing past the file table.
        let mut dangling = bytes.clone();
        let last_file_index = bytes.len() - 8;
        dangling[last_file_index..last_file_index + 4].copy_from_slice(&7u32.to_le_bytes());
        assert!(matches!(
            deserialize(&dangling).unwrap_err(),
            FormatError::CorruptFormat(_)
        ));

        // A path length that runs past its table.
        let mut long_path = bytes.clone();
        long_path[HEADER_LEN..HEADER_LEN + 4].copy_from_slice(&1000u32.to_le_bytes());
        assert!(matches!(
            deserialize(&long_path).unwrap_err(),
            FormatError::CorruptFormat(_)
        ));
    }

    fn arb_index() -> impl Strategy<Value = DumbIndex> {
        (1usize..6, 1usize..4).prop_flat_map(|(dimensions, num_files)| {
            let files = proptest::collection::vec(("[a-z/]{0,12}", "[a-z]{1,8}"), num_files);
            let entries = proptest::collection::vec(
                (
                    proptest::collection::vec(-1.0f32..=1.0, dimensions),
                    0..num_files as u32,
                    any::<u32>(),
                ),
                0..20,
            );
            (files, entries).prop_map(move |(files, entries)| {
                let paths = files.iter().map(|(p, _)| p.clone()).collect();
                let files = files
                    .into_iter()
                    .enumerate()
                    .map(|(i, (_, name))| FileEntry {
                        path_index: i as u32,
                        name: format!("{name}.json"),
                    })
                    .collect();
                let entries = entries
                    .into_iter()
                    .map(|(vector, file_index, position)| IndexEntry {
                        vector,
                        reference: Reference {
                            file_index,
                            position,
                        },
                    })
                    .collect();
                DumbIndex::try_new(dimensions, paths, files, entries).unwrap()
            })
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn lossless_types_round_trip(index in arb_index()) {
            for vector_type in [VectorType::Float32, VectorType::Float64] {
                let bytes = serialize(&index, vector_type).unwrap();
                prop_assert_eq!(&deserialize(&bytes).unwrap(), &index);
            }
        }
    }
}
