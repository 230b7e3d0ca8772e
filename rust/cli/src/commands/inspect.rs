use crate::utils::{CliContext, CliError};
use clap::Parser;
use dumbvec_index::{read_header, DimensionMask, IndexHeader, VectorType};
use dumbvec_storage::StorageError;

#[derive(Parser, Debug)]
pub struct InspectArgs {
    #[clap(long, help = "Name of the index to inspect")]
    pub(crate) name: String,
}

#[derive(Debug)]
pub(crate) struct Inspection {
    pub(crate) key: String,
    pub(crate) size: usize,
    pub(crate) header: IndexHeader,
    pub(crate) mask: Option<DimensionMask>,
}

pub(crate) async fn inspect_index(
    context: &CliContext,
    name: &str,
) -> Result<Inspection, CliError> {
    // The vector type only matters for writing; the header carries its own.
    let key = context.index_tier(VectorType::default()).key(name);
    let bytes = match context.storage.get(&key).await {
        Ok(bytes) => bytes,
        Err(StorageError::NotFound { .. }) => return Err(CliError::IndexNotFound(name.to_string())),
        Err(e) => return Err(e.into()),
    };
    let header = read_header(&bytes)?;
    let mask = context.read_mask(name).await?;
    Ok(Inspection {
        key,
        size: bytes.len(),
        header,
        mask,
    })
}

pub async fn inspect(context: &CliContext, args: InspectArgs) -> Result<(), CliError> {
    let Inspection {
        key,
        size,
        header,
        mask,
    } = inspect_index(context, &args.name).await?;
    println!("key:               {key}");
    println!("size:              {size} bytes");
    println!("format version:    {}", header.version);
    println!("vector type:       {}", header.vector_type);
    println!("dimensions:        {}", header.num_dimensions);
    println!("paths:             {}", header.num_paths);
    println!("files:             {}", header.num_files);
    println!("entries:           {}", header.num_tuples);
    println!("path table bytes:  {}", header.path_table_bytes);
    println!("file table bytes:  {}", header.file_table_bytes);
    println!("tuple table bytes: {}", header.tuple_table_bytes);
    if header.total_len() != size as u64 {
        println!(
            "warning: header describes {} bytes, blob holds {size}",
            header.total_len()
        );
    }
    match mask {
        Some(mask) => println!(
            "mask:              keeps {} of {} dimensions",
            mask.kept(),
            mask.width()
        ),
        None => println!("mask:              none"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_context;
    use dumbvec_index::{serialize, FormatError};
    use dumbvec_storage::PutOptions;
    use dumbvec_types::{DumbIndex, FileEntry, IndexEntry, Reference};

    fn small_index() -> DumbIndex {
        DumbIndex::try_new(
            2,
            vec!["docs".to_string()],
            vec![FileEntry {
                path_index: 0,
                name: "0.json".to_string(),
            }],
            vec![IndexEntry {
                vector: vec![0.5, 0.25],
                reference: Reference {
                    file_index: 0,
                    position: 0,
                },
            }],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_inspect_stored_index() {
        let (_dir, context) = test_context();
        let bytes = serialize(&small_index(), VectorType::Uint8).unwrap();
        let key = context.index_tier(VectorType::Uint8).key("small");
        context
            .storage
            .put_bytes(&key, bytes.clone(), PutOptions::default())
            .await
            .unwrap();

        let inspection = inspect_index(&context, "small").await.unwrap();
        assert_eq!(inspection.key, "indexes/small.dumb_index");
        assert_eq!(inspection.size, bytes.len());
        assert_eq!(inspection.header.vector_type, VectorType::Uint8);
        assert_eq!(inspection.header.num_dimensions, 2);
        assert_eq!(inspection.header.num_tuples, 1);
        assert_eq!(inspection.header.total_len(), bytes.len() as u64);
        assert!(inspection.mask.is_none());
    }

    #[tokio::test]
    async fn test_inspect_missing_index() {
        let (_dir, context) = test_context();
        let err = inspect_index(&context, "nope").await.unwrap_err();
        assert!(matches!(err, CliError::IndexNotFound(_)));
    }

    #[tokio::test]
    async fn test_inspect_rejects_garbage() {
        let (_dir, context) = test_context();
        let key = context.index_tier(VectorType::Float32).key("junk");
        context
            .storage
            .put_bytes(&key, vec![0u8; 64], PutOptions::default())
            .await
            .unwrap();
        let err = inspect_index(&context, "junk").await.unwrap_err();
        assert!(matches!(
            err,
            CliError::Format(FormatError::CorruptFormat(_))
        ));
    }
}
