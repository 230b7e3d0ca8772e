use std::collections::HashMap;

use dumbvec_distance::normalize;
use dumbvec_error::{DumbvecError, ErrorCodes};
use dumbvec_storage::Storage;
use dumbvec_types::{Document, DumbIndex, FileEntry, IndexEntry, IndexValidationError, Reference};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chunks::{list_chunk_files, ChunkError, ChunkResolver};
use crate::mask::{compute_mask, DimensionMask, MaskError};

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Document {position} of file {file_index} embeds to {got} dimensions, expected {expected}")]
    DimensionMismatch {
        file_index: u32,
        position: u32,
        expected: usize,
        got: usize,
    },
    #[error("Document {position} of file {file_index} embeds to a zero vector, which cannot be normalized")]
    DegenerateVector { file_index: u32, position: u32 },
    #[error(transparent)]
    Mask(#[from] MaskError),
    #[error(transparent)]
    Validation(#[from] IndexValidationError),
    #[error(transparent)]
    Chunk(#[from] ChunkError),
}

impl DumbvecError for BuildError {
    fn code(&self) -> ErrorCodes {
        match self {
            BuildError::DimensionMismatch { .. } => ErrorCodes::InvalidArgument,
            BuildError::DegenerateVector { .. } => ErrorCodes::InvalidArgument,
            BuildError::Mask(e) => e.code(),
            BuildError::Validation(e) => e.code(),
            BuildError::Chunk(e) => e.code(),
        }
    }
}

/// Turns a document into a vector, or `None` to leave the document out of
/// the index.
pub trait Embed {
    fn embed(&self, document: &Document) -> Option<Vec<f32>>;
}

impl<F> Embed for F
where
    F: Fn(&Document) -> Option<Vec<f32>>,
{
    fn embed(&self, document: &Document) -> Option<Vec<f32>> {
        self(document)
    }
}

/// Reads a precomputed embedding stored as a numeric array under `field`.
#[derive(Clone, Debug)]
pub struct FieldEmbedding {
    pub field: String,
}

impl FieldEmbedding {
    pub fn new(field: impl Into<String>) -> Self {
        FieldEmbedding {
            field: field.into(),
        }
    }
}

impl Embed for FieldEmbedding {
    fn embed(&self, document: &Document) -> Option<Vec<f32>> {
        document.numeric_array(&self.field)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildOptions {
    /// Drop dimensions whose range across all vectors is below this value.
    /// Zero or less keeps every dimension.
    #[serde(default)]
    pub dimension_threshold: f32,
    /// Scale every vector to unit length before masking.
    #[serde(default)]
    pub normalize: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BuiltIndex {
    pub index: DumbIndex,
    /// The mask applied to every vector. `None` only for an empty index.
    pub mask: Option<DimensionMask>,
}

/// Accumulates documents, file by file, into an index.
///
/// Files get indices in the order they are first added and documents keep
/// their ordinal position in their file, whether or not earlier documents
/// were skipped.
#[derive(Debug, Default)]
pub struct IndexBuilder {
    options: BuildOptions,
    paths: Vec<String>,
    path_lookup: HashMap<String, u32>,
    files: Vec<FileEntry>,
    file_lookup: HashMap<(u32, String), u32>,
    vectors: Vec<Vec<f32>>,
    references: Vec<Reference>,
    skipped: usize,
}

impl IndexBuilder {
    pub fn new(options: BuildOptions) -> Self {
        IndexBuilder {
            options,
            ..Default::default()
        }
    }

    pub fn add_path(&mut self, path: &str) -> u32 {
        if let Some(index) = self.path_lookup.get(path) {
            return *index;
        }
        let index = self.paths.len() as u32;
        self.paths.push(path.to_string());
        self.path_lookup.insert(path.to_string(), index);
        index
    }

    pub fn add_file(&mut self, path: &str, name: &str) -> u32 {
        let path_index = self.add_path(path);
        let key = (path_index, name.to_string());
        if let Some(index) = self.file_lookup.get(&key) {
            return *index;
        }
        let index = self.files.len() as u32;
        self.files.push(FileEntry {
            path_index,
            name: name.to_string(),
        });
        self.file_lookup.insert(key, index);
        index
    }

    /// Embeds every document of one file. Returns how many were indexed.
    pub fn add_documents<'a, E>(
        &mut self,
        file_index: u32,
        documents: impl IntoIterator<Item = &'a Document>,
        embed: &E,
    ) -> Result<usize, BuildError>
    where
        E: Embed + ?Sized,
    {
        let mut added = 0;
        for (position, document) in documents.into_iter().enumerate() {
            let position = position as u32;
            let Some(vector) = embed.embed(document) else {
                self.skipped += 1;
                continue;
            };
            if let Some(expected) = self.vectors.first().map(Vec::len) {
                if vector.len() != expected {
                    return Err(BuildError::DimensionMismatch {
                        file_index,
                        position,
                        expected,
                        got: vector.len(),
                    });
                }
            }
            let vector = if self.options.normalize {
                normalize(&vector).ok_or(BuildError::DegenerateVector {
                    file_index,
                    position,
                })?
            } else {
                vector
            };
            self.vectors.push(vector);
            self.references.push(Reference {
                file_index,
                position,
            });
            added += 1;
        }
        Ok(added)
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn finish(self) -> Result<BuiltIndex, BuildError> {
        let width = self.vectors.first().map(Vec::len).unwrap_or(0);
        let mask = if self.options.dimension_threshold > 0.0 {
            compute_mask(&self.vectors, self.options.dimension_threshold)?
        } else if self.vectors.is_empty() {
            None
        } else {
            Some(DimensionMask::all(width))
        };

        let (dimensions, vectors) = match &mask {
            Some(mask) if !mask.is_identity() => {
                let reduced = self
                    .vectors
                    .iter()
                    .map(|v| mask.apply(v))
                    .collect::<Result<Vec<_>, _>>()?;
                (mask.kept(), reduced)
            }
            _ => (width, self.vectors),
        };

        tracing::info!(
            entries = vectors.len(),
            skipped = self.skipped,
            files = self.files.len(),
            source_dimensions = width,
            dimensions,
            "Built index"
        );

        let entries = vectors
            .into_iter()
            .zip(self.references)
            .map(|(vector, reference)| IndexEntry { vector, reference })
            .collect();
        let index = DumbIndex::try_new(dimensions, self.paths, self.files, entries)?;
        Ok(BuiltIndex { index, mask })
    }
}

/// A chunk file and its documents, for building from memory.
#[derive(Clone, Debug)]
pub struct SourceFile {
    pub path: String,
    pub name: String,
    pub documents: Vec<Document>,
}

/// Builds an index from files in the given order.
pub fn build<E>(
    sources: &[SourceFile],
    embed: &E,
    options: BuildOptions,
) -> Result<BuiltIndex, BuildError>
where
    E: Embed + ?Sized,
{
    let mut builder = IndexBuilder::new(options);
    for source in sources {
        let file_index = builder.add_file(&source.path, &source.name);
        builder.add_documents(file_index, &source.documents, embed)?;
    }
    builder.finish()
}

/// Strips trailing `/` and drops repeats, keeping the first occurrence.
fn unique_paths(paths: &[String]) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.trim_end_matches('/');
        if unique.iter().any(|p| p == path) {
            tracing::warn!(path, "Ignoring repeated source path");
            continue;
        }
        unique.push(path.to_string());
    }
    unique
}

/// Builds an index from every chunk file under `paths`, in path order and
/// then key order. Files are read through `resolver`, so their documents are
/// cached for resolving search results afterwards.
#[tracing::instrument(skip(storage, embed, resolver))]
pub async fn build_from_storage<E>(
    storage: &Storage,
    paths: &[String],
    embed: &E,
    options: BuildOptions,
    resolver: &ChunkResolver,
) -> Result<BuiltIndex, BuildError>
where
    E: Embed + Sync + ?Sized,
{
    let paths = unique_paths(paths);
    let mut builder = IndexBuilder::new(options);
    // Every path gets a slot, even one without chunk files, so that listed
    // path indices line up with the builder's.
    for path in &paths {
        builder.add_path(path);
    }
    for file in list_chunk_files(storage, &paths).await? {
        let path = &paths[file.path_index as usize];
        let documents = resolver.read_file(path, &file.name).await?;
        let file_index = builder.add_file(path, &file.name);
        let added = builder.add_documents(file_index, &documents, embed)?;
        tracing::debug!(path = %path, file = %file.name, added, "Indexed chunk file");
    }
    builder.finish()
}
