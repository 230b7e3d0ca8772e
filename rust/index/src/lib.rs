pub mod builder;
pub mod chunks;
pub mod codec;
pub mod format;
pub mod mask;
pub mod search;
pub mod store;

pub use builder::{
    build, build_from_storage, BuildError, BuildOptions, BuiltIndex, Embed, FieldEmbedding,
    IndexBuilder, SourceFile,
};
pub use chunks::{
    list_chunk_files, read_chunk_file, write_chunk_file, ChunkError, ChunkId, ChunkResolver,
    ResolveError, ResolvedChunk,
};
pub use codec::{decode, encode, CodecError, VectorType};
pub use format::{deserialize, read_header, serialize, FormatError, IndexHeader};
pub use mask::{compute_mask, DimensionMask, MaskError};
pub use search::{
    prepare_query, ranked_index, top_k, top_k_index, ScoredEntry, SearchError,
};
pub use store::{
    sanitize_name, CacheTier, Chain, DocSetChain, IndexChain, Persist, StorageTier, StoreError,
    Tier, WriteOutcome,
};
