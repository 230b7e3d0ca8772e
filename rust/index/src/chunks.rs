//! Chunk files hold the documents an index points back into.
//!
//! A chunk file is a JSON array of documents stored at `{path}/{file}`. An
//! index reference names a file (through the file and path tables) and the
//! ordinal position of a document inside it.

use dumbvec_cache::{Cache, CacheConfig, CacheError, UnboundedCacheConfig, Weighted};
use dumbvec_error::{DumbvecError, ErrorCodes};
use dumbvec_storage::{PutOptions, Storage, StorageError};
use dumbvec_types::{DocSet, Document, DumbIndex, FileEntry, Reference};
use thiserror::Error;

pub const CHUNK_FILE_EXTENSION: &str = ".json";

#[derive(Error, Debug)]
pub enum ChunkError {
    #[error("Invalid chunk file name {0:?}: must end in .json and contain no '/'")]
    InvalidChunkFileName(String),
    #[error("Chunk file {key} is not a JSON array of objects: {source}")]
    InvalidChunkFile {
        key: String,
        source: serde_json::Error,
    },
    #[error("Failed to encode chunk file {key}: {source}")]
    Encode {
        key: String,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl DumbvecError for ChunkError {
    fn code(&self) -> ErrorCodes {
        match self {
            ChunkError::InvalidChunkFileName(_) => ErrorCodes::InvalidArgument,
            ChunkError::InvalidChunkFile { .. } => ErrorCodes::DataLoss,
            ChunkError::Encode { .. } => ErrorCodes::Internal,
            ChunkError::Storage(e) => e.code(),
        }
    }
}

fn validate_file_name(file: &str) -> Result<(), ChunkError> {
    if file.contains('/') || !file.ends_with(CHUNK_FILE_EXTENSION) || file == CHUNK_FILE_EXTENSION
    {
        return Err(ChunkError::InvalidChunkFileName(file.to_string()));
    }
    Ok(())
}

pub fn chunk_key(path: &str, file: &str) -> String {
    let path = path.trim_end_matches('/');
    if path.is_empty() {
        file.to_string()
    } else {
        format!("{path}/{file}")
    }
}

pub async fn write_chunk_file(
    storage: &Storage,
    path: &str,
    file: &str,
    documents: &[Document],
) -> Result<(), ChunkError> {
    validate_file_name(file)?;
    let key = chunk_key(path, file);
    let bytes = serde_json::to_vec(documents).map_err(|source| ChunkError::Encode {
        key: key.clone(),
        source,
    })?;
    storage.put_bytes(&key, bytes, PutOptions::default()).await?;
    tracing::debug!(key = %key, documents = documents.len(), "Wrote chunk file");
    Ok(())
}

pub async fn read_chunk_file(
    storage: &Storage,
    path: &str,
    file: &str,
) -> Result<Vec<Document>, ChunkError> {
    validate_file_name(file)?;
    let key = chunk_key(path, file);
    let bytes = storage.get(&key).await?;
    serde_json::from_slice(&bytes).map_err(|source| {
        tracing::error!(key = %key, error = %source, "Failed to decode chunk file");
        ChunkError::InvalidChunkFile { key, source }
    })
}

/// Lists the chunk files directly under each of `paths`, in path order and
/// then key order. `path_index` of every entry is the position of its path
/// in `paths`.
pub async fn list_chunk_files(
    storage: &Storage,
    paths: &[String],
) -> Result<Vec<FileEntry>, ChunkError> {
    let mut files = Vec::new();
    for (path_index, path) in paths.iter().enumerate() {
        let prefix = path.trim_end_matches('/');
        for key in storage.list_prefix(prefix).await? {
            let name = if prefix.is_empty() {
                key.as_str()
            } else {
                match key.strip_prefix(prefix).and_then(|k| k.strip_prefix('/')) {
                    Some(name) => name,
                    None => continue,
                }
            };
            if validate_file_name(name).is_ok() {
                files.push(FileEntry {
                    path_index: path_index as u32,
                    name: name.to_string(),
                });
            }
        }
    }
    Ok(files)
}

/// Identifies one document: its chunk file and position in that file.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChunkId {
    pub path: String,
    pub file: String,
    pub position: u32,
}

impl std::fmt::Display for ChunkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", chunk_key(&self.path, &self.file), self.position)
    }
}

impl Weighted for ChunkId {
    fn weight(&self) -> usize {
        self.path.len() + self.file.len() + 4
    }
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Entry {position} references a file missing from the index")]
    DanglingReference { position: usize },
    #[error("No document at {0}")]
    NotFound(ChunkId),
    #[error(transparent)]
    Chunk(#[from] ChunkError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl DumbvecError for ResolveError {
    fn code(&self) -> ErrorCodes {
        match self {
            ResolveError::DanglingReference { .. } => ErrorCodes::DataLoss,
            ResolveError::NotFound(_) => ErrorCodes::NotFound,
            ResolveError::Chunk(e) => e.code(),
            ResolveError::Cache(e) => e.code(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedChunk {
    /// Position of the entry in the index.
    pub position: usize,
    pub reference: Reference,
    pub id: ChunkId,
    pub document: Document,
}

/// Reads documents out of chunk files, remembering what it has read.
///
/// `chunks` holds single documents; `files` remembers which chunk ids a file
/// expanded to, so that a whole file can be served from `chunks` while all of
/// its documents are still cached. Both caches belong to the resolver.
pub struct ChunkResolver {
    storage: Storage,
    chunks: Box<dyn Cache<ChunkId, Document>>,
    files: Box<dyn Cache<String, Vec<ChunkId>>>,
    read_through_cache: bool,
}

impl ChunkResolver {
    pub fn new(
        storage: Storage,
        chunks: Box<dyn Cache<ChunkId, Document>>,
        files: Box<dyn Cache<String, Vec<ChunkId>>>,
    ) -> Self {
        ChunkResolver {
            storage,
            chunks,
            files,
            read_through_cache: false,
        }
    }

    /// A resolver whose caches never evict.
    pub fn unbounded(storage: Storage) -> Self {
        let config = UnboundedCacheConfig {};
        ChunkResolver::new(
            storage,
            Box::new(config.build::<ChunkId, Document>()),
            Box::new(config.build::<String, Vec<ChunkId>>()),
        )
    }

    pub async fn from_config(
        storage: Storage,
        config: &CacheConfig,
    ) -> Result<Self, Box<dyn DumbvecError>> {
        let chunks = dumbvec_cache::from_config::<ChunkId, Document>(config).await?;
        let files = dumbvec_cache::from_config::<String, Vec<ChunkId>>(config).await?;
        Ok(ChunkResolver::new(storage, chunks, files))
    }

    /// Always go to storage and leave the caches untouched.
    pub fn with_read_through_cache(mut self, read_through_cache: bool) -> Self {
        self.read_through_cache = read_through_cache;
        self
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub async fn clear(&self) -> Result<(), ResolveError> {
        self.chunks.clear().await?;
        self.files.clear().await?;
        Ok(())
    }

    async fn cached_file(&self, key: &str) -> Option<Vec<Document>> {
        let ids = self.files.get(&key.to_string()).await.ok().flatten()?;
        let mut documents = Vec::with_capacity(ids.len());
        for id in &ids {
            documents.push(self.chunks.get(id).await.ok().flatten()?);
        }
        Some(documents)
    }

    /// All documents of a chunk file.
    pub async fn read_file(&self, path: &str, file: &str) -> Result<Vec<Document>, ChunkError> {
        let key = chunk_key(path, file);
        if !self.read_through_cache {
            if let Some(documents) = self.cached_file(&key).await {
                return Ok(documents);
            }
        }
        let documents = read_chunk_file(&self.storage, path, file).await?;
        if !self.read_through_cache && !documents.is_empty() {
            let mut ids = Vec::with_capacity(documents.len());
            for (position, document) in documents.iter().enumerate() {
                let id = ChunkId {
                    path: path.to_string(),
                    file: file.to_string(),
                    position: position as u32,
                };
                self.chunks.insert(id.clone(), document.clone()).await;
                ids.push(id);
            }
            self.files.insert(key, ids).await;
        }
        Ok(documents)
    }

    /// One document, loading (and caching) its whole file on a miss.
    pub async fn read_chunk(&self, id: &ChunkId) -> Result<Document, ResolveError> {
        if !self.read_through_cache {
            if let Ok(Some(document)) = self.chunks.get(id).await {
                return Ok(document);
            }
        }
        let mut documents = self.read_file(&id.path, &id.file).await?;
        let position = id.position as usize;
        if position >= documents.len() {
            return Err(ResolveError::NotFound(id.clone()));
        }
        Ok(documents.swap_remove(position))
    }

    /// Resolves `index.entries()[offset..offset + amount]`, clamped to the
    /// index, to documents. Each entry succeeds or fails on its own.
    pub async fn resolve(
        &self,
        index: &DumbIndex,
        offset: usize,
        amount: usize,
    ) -> Vec<Result<ResolvedChunk, ResolveError>> {
        let start = offset.min(index.len());
        let end = offset.saturating_add(amount).min(index.len());
        let mut resolved = Vec::with_capacity(end - start);
        for (position, entry) in index.entries()[start..end].iter().enumerate() {
            let position = start + position;
            let reference = entry.reference;
            let result = match index.locate(&reference) {
                Some((path, file)) => {
                    let id = ChunkId {
                        path: path.to_string(),
                        file: file.to_string(),
                        position: reference.position,
                    };
                    self.read_chunk(&id)
                        .await
                        .map(|document| ResolvedChunk {
                            position,
                            reference,
                            id,
                            document,
                        })
                }
                None => Err(ResolveError::DanglingReference { position }),
            };
            if let Err(e) = &result {
                tracing::warn!(position, error = %e, "Failed to resolve index entry");
            }
            resolved.push(result);
        }
        resolved
    }

    /// The documents behind a range of entries as a doc set named
    /// `{index_name}_{offset}_{amount}`. Fails on the first entry that
    /// cannot be resolved.
    pub async fn docset_for_range(
        &self,
        index_name: &str,
        index: &DumbIndex,
        offset: usize,
        amount: usize,
    ) -> Result<DocSet, ResolveError> {
        let documents = self
            .resolve(index, offset, amount)
            .await
            .into_iter()
            .map(|resolved| resolved.map(|r| r.document))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DocSet::new(
            format!("{index_name}_{offset}_{amount}"),
            documents,
        ))
    }
}

impl std::fmt::Debug for ChunkResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkResolver")
            .field("storage", &self.storage)
            .field("read_through_cache", &self.read_through_cache)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dumbvec_storage::test_storage;
    use dumbvec_types::IndexEntry;
    use serde_json::json;

    fn doc(id: usize) -> Document {
        Document::try_from(json!({ "id": id })).unwrap()
    }

    #[tokio::test]
    async fn test_file_name_rules() {
        let storage = Storage::in_memory();
        for bad in ["a/b.json", "chunk.txt", ".json"] {
            let err = write_chunk_file(&storage, "p", bad, &[]).await.unwrap_err();
            assert!(matches!(err, ChunkError::InvalidChunkFileName(_)), "{bad}");
        }
        write_chunk_file(&storage, "p", "ok.json", &[]).await.unwrap();
    }

    #[tokio::test]
    async fn test_write_read_list() {
        let (_dir, storage) = test_storage();
        write_chunk_file(&storage, "corpus/b", "1.json", &[doc(3)])
            .await
            .unwrap();
        write_chunk_file(&storage, "corpus/a", "1.json", &[doc(1), doc(2)])
            .await
            .unwrap();
        write_chunk_file(&storage, "corpus/a", "0.json", &[doc(0)])
            .await
            .unwrap();
        storage
            .put_bytes("corpus/a/notes.txt", b"x".to_vec(), PutOptions::default())
            .await
            .unwrap();
        storage
            .put_bytes("corpus/a/deeper/2.json", b"[]".to_vec(), PutOptions::default())
            .await
            .unwrap();

        assert_eq!(
            read_chunk_file(&storage, "corpus/a", "1.json").await.unwrap(),
            vec![doc(1), doc(2)]
        );

        let files = list_chunk_files(
            &storage,
            &["corpus/b".to_string(), "corpus/a/".to_string()],
        )
        .await
        .unwrap();
        let listed: Vec<_> = files
            .iter()
            .map(|f| (f.path_index, f.name.as_str()))
            .collect();
        assert_eq!(listed, vec![(0, "1.json"), (1, "0.json"), (1, "1.json")]);
    }

    #[tokio::test]
    async fn test_invalid_chunk_file() {
        let storage = Storage::in_memory();
        storage
            .put_bytes("p/bad.json", b"{\"not\": \"a list\"}".to_vec(), PutOptions::default())
            .await
            .unwrap();
        let err = read_chunk_file(&storage, "p", "bad.json").await.unwrap_err();
        assert!(matches!(err, ChunkError::InvalidChunkFile { .. }));
        assert_eq!(err.code(), ErrorCodes::DataLoss);
    }

    fn index_over(entries: Vec<(u32, u32)>) -> DumbIndex {
        DumbIndex::try_new(
            1,
            vec!["p".to_string()],
            vec![
                FileEntry {
                    path_index: 0,
                    name: "0.json".to_string(),
                },
                FileEntry {
                    path_index: 0,
                    name: "missing.json".to_string(),
                },
            ],
            entries
                .into_iter()
                .map(|(file_index, position)| IndexEntry {
                    vector: vec![0.0],
                    reference: Reference {
                        file_index,
                        position,
                    },
                })
                .collect(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_resolver_caches_whole_files() {
        let storage = Storage::in_memory();
        write_chunk_file(&storage, "p", "0.json", &[doc(0), doc(1)])
            .await
            .unwrap();
        let resolver = ChunkResolver::unbounded(storage.clone());
        let id = ChunkId {
            path: "p".to_string(),
            file: "0.json".to_string(),
            position: 1,
        };
        assert_eq!(resolver.read_chunk(&id).await.unwrap(), doc(1));

        // Served from the cache after the file changes underneath.
        write_chunk_file(&storage, "p", "0.json", &[doc(10), doc(11)])
            .await
            .unwrap();
        assert_eq!(resolver.read_chunk(&id).await.unwrap(), doc(1));
        assert_eq!(
            resolver.read_file("p", "0.json").await.unwrap(),
            vec![doc(0), doc(1)]
        );

        let bypass = ChunkResolver::unbounded(storage.clone()).with_read_through_cache(true);
        assert_eq!(bypass.read_chunk(&id).await.unwrap(), doc(11));

        resolver.clear().await.unwrap();
        assert_eq!(resolver.read_chunk(&id).await.unwrap(), doc(11));
    }

    #[tokio::test]
    async fn test_empty_file_is_not_cached() {
        let storage = Storage::in_memory();
        write_chunk_file(&storage, "p", "0.json", &[]).await.unwrap();
        let resolver = ChunkResolver::unbounded(storage.clone());
        assert!(resolver.read_file("p", "0.json").await.unwrap().is_empty());
        write_chunk_file(&storage, "p", "0.json", &[doc(5)])
            .await
            .unwrap();
        assert_eq!(resolver.read_file("p", "0.json").await.unwrap(), vec![doc(5)]);
    }

    #[tokio::test]
    async fn test_resolve_reports_failures_per_entry() {
        let storage = Storage::in_memory();
        write_chunk_file(&storage, "p", "0.json", &[doc(0), doc(1)])
            .await
            .unwrap();
        let resolver = ChunkResolver::unbounded(storage);
        let index = index_over(vec![(0, 1), (0, 7), (1, 0), (0, 0)]);

        let resolved = resolver.resolve(&index, 0, 10).await;
        assert_eq!(resolved.len(), 4);
        assert_eq!(resolved[0].as_ref().unwrap().document, doc(1));
        assert!(matches!(resolved[1], Err(ResolveError::NotFound(_))));
        let missing_file = resolved[2].as_ref().unwrap_err();
        assert_eq!(missing_file.code(), ErrorCodes::NotFound);
        assert_eq!(resolved[3].as_ref().unwrap().position, 3);

        let tail = resolver.resolve(&index, 3, 5).await;
        assert_eq!(tail.len(), 1);
        assert!(resolver.resolve(&index, 9, 5).await.is_empty());
    }

    #[tokio::test]
    async fn test_docset_for_range() {
        let storage = Storage::in_memory();
        write_chunk_file(&storage, "p", "0.json", &[doc(0), doc(1)])
            .await
            .unwrap();
        let resolver = ChunkResolver::unbounded(storage);
        let index = index_over(vec![(0, 1), (0, 0), (1, 0)]);

        let docs = resolver
            .docset_for_range("notes", &index, 0, 2)
            .await
            .unwrap();
        assert_eq!(docs.name, "notes_0_2");
        assert_eq!(docs.documents, vec![doc(1), doc(0)]);

        assert!(resolver
            .docset_for_range("notes", &index, 1, 2)
            .await
            .is_err());
    }
}
