use crate::utils::{CliContext, CliError};
use clap::Parser;
use dumbvec_index::chunks::chunk_key;
use dumbvec_index::write_chunk_file;
use dumbvec_types::Document;
use std::path::PathBuf;

#[derive(Parser, Debug)]
pub struct WriteChunksArgs {
    #[clap(long, help = "Path (key prefix) to store the chunk file under")]
    path: String,
    #[clap(long, help = "Name of the chunk file, ending in .json")]
    file: String,
    #[clap(long, help = "Local JSON file holding an array of documents")]
    input: PathBuf,
}

pub async fn write_chunks(context: &CliContext, args: WriteChunksArgs) -> Result<(), CliError> {
    let input = args.input.display().to_string();
    let raw = tokio::fs::read(&args.input)
        .await
        .map_err(|source| CliError::Io {
            path: input.clone(),
            source,
        })?;
    let documents: Vec<Document> =
        serde_json::from_slice(&raw).map_err(|source| CliError::InvalidJson {
            what: format!("documents in {input}"),
            source,
        })?;
    write_chunk_file(&context.storage, &args.path, &args.file, &documents).await?;
    println!(
        "Wrote {} documents to {}",
        documents.len(),
        chunk_key(&args.path, &args.file)
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_context;
    use dumbvec_index::read_chunk_file;

    #[tokio::test]
    async fn test_write_chunks_from_file() {
        let (_dir, context) = test_context();
        let input = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            input.path(),
            r#"[{"text": "a", "embedding": [1, 0]}, {"text": "b"}]"#,
        )
        .unwrap();

        let args = WriteChunksArgs {
            path: "docs".to_string(),
            file: "0.json".to_string(),
            input: input.path().to_path_buf(),
        };
        write_chunks(&context, args).await.unwrap();

        let documents = read_chunk_file(&context.storage, "docs", "0.json")
            .await
            .unwrap();
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].numeric_array("embedding"), Some(vec![1.0, 0.0]));
        assert_eq!(documents[1].get("text"), Some(&serde_json::json!("b")));
    }

    #[tokio::test]
    async fn test_write_chunks_rejects_non_array_input() {
        let (_dir, context) = test_context();
        let input = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(input.path(), r#"{"text": "a"}"#).unwrap();

        let args = WriteChunksArgs {
            path: "docs".to_string(),
            file: "0.json".to_string(),
            input: input.path().to_path_buf(),
        };
        let err = write_chunks(&context, args).await.unwrap_err();
        assert!(matches!(err, CliError::InvalidJson { .. }));
    }

    #[tokio::test]
    async fn test_write_chunks_missing_input() {
        let (dir, context) = test_context();
        let args = WriteChunksArgs {
            path: "docs".to_string(),
            file: "0.json".to_string(),
            input: dir.path().join("missing.json"),
        };
        let err = write_chunks(&context, args).await.unwrap_err();
        assert!(matches!(err, CliError::Io { .. }));
    }
}
