use dumbvec_cache::Weighted;
use dumbvec_error::{DumbvecError, ErrorCodes};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Locates the document a vector was computed from: the file it lives in
/// (an index into the file table) and its ordinal position within that file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Reference {
    pub file_index: u32,
    pub position: u32,
}

/// One physical container (a chunk file) that contributed documents.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileEntry {
    pub path_index: u32,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IndexEntry {
    pub vector: Vec<f32>,
    pub reference: Reference,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexValidationError {
    #[error("Entry {position} has {got} dimensions, expected {expected}")]
    DimensionMismatch {
        position: usize,
        expected: usize,
        got: usize,
    },
    #[error("File {file} references path {path_index} but there are only {num_paths} paths")]
    DanglingPathIndex {
        file: usize,
        path_index: u32,
        num_paths: usize,
    },
    #[error("Entry {position} references file {file_index} but there are only {num_files} files")]
    DanglingFileIndex {
        position: usize,
        file_index: u32,
        num_files: usize,
    },
}

impl DumbvecError for IndexValidationError {
    fn code(&self) -> ErrorCodes {
        ErrorCodes::InvalidArgument
    }
}

/// An in-memory brute-force index.
///
/// Holds a path table, a file table and an ordered sequence of
/// (vector, reference) entries. All vectors share `dimensions`, every file
/// points at an existing path and every reference points at an existing
/// file; [`DumbIndex::try_new`] is the only way to build one, so these hold
/// for every value of this type.
///
/// The name of an index is not part of the container, it is the key it is
/// stored under.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct DumbIndex {
    dimensions: usize,
    paths: Vec<String>,
    files: Vec<FileEntry>,
    entries: Vec<IndexEntry>,
}

impl DumbIndex {
    pub fn try_new(
        dimensions: usize,
        paths: Vec<String>,
        files: Vec<FileEntry>,
        entries: Vec<IndexEntry>,
    ) -> Result<Self, IndexValidationError> {
        for (file, entry) in files.iter().enumerate() {
            if entry.path_index as usize >= paths.len() {
                return Err(IndexValidationError::DanglingPathIndex {
                    file,
                    path_index: entry.path_index,
                    num_paths: paths.len(),
                });
            }
        }
        for (position, entry) in entries.iter().enumerate() {
            if entry.vector.len() != dimensions {
                return Err(IndexValidationError::DimensionMismatch {
                    position,
                    expected: dimensions,
                    got: entry.vector.len(),
                });
            }
            if entry.reference.file_index as usize >= files.len() {
                return Err(IndexValidationError::DanglingFileIndex {
                    position,
                    file_index: entry.reference.file_index,
                    num_files: files.len(),
                });
            }
        }
        Ok(DumbIndex {
            dimensions,
            paths,
            files,
            entries,
        })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The (path, file name) a reference points at.
    pub fn locate(&self, reference: &Reference) -> Option<(&str, &str)> {
        let file = self.files.get(reference.file_index as usize)?;
        let path = self.paths.get(file.path_index as usize)?;
        Some((path.as_str(), file.name.as_str()))
    }

    /// A new index containing the entries at `positions`, in that order,
    /// sharing this index's path and file tables.
    pub fn select(&self, positions: &[usize]) -> Option<DumbIndex> {
        let entries = positions
            .iter()
            .map(|&position| self.entries.get(position).cloned())
            .collect::<Option<Vec<_>>>()?;
        Some(DumbIndex {
            dimensions: self.dimensions,
            paths: self.paths.clone(),
            files: self.files.clone(),
            entries,
        })
    }

    pub fn into_parts(self) -> (usize, Vec<String>, Vec<FileEntry>, Vec<IndexEntry>) {
        (self.dimensions, self.paths, self.files, self.entries)
    }
}

impl Weighted for DumbIndex {
    fn weight(&self) -> usize {
        let strings = self.paths.iter().map(String::len).sum::<usize>()
            + self.files.iter().map(|f| f.name.len() + 4).sum::<usize>();
        let entries = self.entries.len() * (self.dimensions * std::mem::size_of::<f32>() + 8);
        std::mem::size_of::<Self>() + strings + entries
    }
}
