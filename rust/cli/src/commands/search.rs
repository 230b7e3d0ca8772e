use crate::utils::{CliContext, CliError};
use clap::Parser;
use dumbvec_distance::SimilarityMetric;
use dumbvec_index::{prepare_query, ranked_index, top_k, ChunkResolver};
use serde_json::{json, Value};

#[derive(Parser, Debug)]
pub struct SearchArgs {
    #[clap(long, help = "Name of the index to search")]
    pub(crate) name: String,
    #[clap(long, help = "Query vector as a JSON array, e.g. \"[0.1, 0.2]\"")]
    pub(crate) query: String,
    #[clap(short = 'k', long = "top-k", default_value_t = 10, help = "Number of results")]
    pub(crate) k: usize,
    #[clap(long, help = "Similarity metric: dot or cosine")]
    pub(crate) metric: Option<SimilarityMetric>,
    #[clap(
        long,
        default_value = "embedding",
        help = "Vector field, left out of printed documents"
    )]
    pub(crate) field: String,
}

/// One JSON object per hit, best first. A hit whose document cannot be read
/// carries an `error` instead of a `document`.
pub(crate) async fn search_hits(
    context: &CliContext,
    args: &SearchArgs,
) -> Result<Vec<Value>, CliError> {
    let query: Vec<f32> =
        serde_json::from_str(&args.query).map_err(|source| CliError::InvalidJson {
            what: "query".to_string(),
            source,
        })?;
    let metric = args.metric.unwrap_or(context.config.index.metric);

    let chain = context
        .index_chain(context.config.index.vector_type)
        .await?;
    let index = chain
        .read(&args.name)
        .await?
        .ok_or_else(|| CliError::IndexNotFound(args.name.clone()))?;
    let mask = context.read_mask(&args.name).await?;
    let query = prepare_query(&query, mask.as_ref())?;
    let scored = top_k(&index, &query, args.k, metric)?;
    tracing::debug!(name = %args.name, %metric, hits = scored.len(), "Searched index");

    let ranked = ranked_index(&index, &scored)?;
    let resolver =
        ChunkResolver::from_config(context.storage.clone(), &context.config.cache).await?;
    let resolved = resolver.resolve(&ranked, 0, ranked.len()).await;

    let hits = scored
        .iter()
        .zip(resolved)
        .enumerate()
        .map(|(rank, (scored, resolved))| {
            let mut hit = json!({
                "rank": rank + 1,
                "score": scored.score,
                "position": scored.position,
            });
            match resolved {
                Ok(chunk) => {
                    let mut fields = chunk.document.fields().clone();
                    fields.remove(&args.field);
                    hit["path"] = json!(chunk.id.path);
                    hit["file"] = json!(chunk.id.file);
                    hit["chunk"] = json!(chunk.id.position);
                    hit["document"] = Value::Object(fields);
                }
                Err(e) => hit["error"] = json!(e.to_string()),
            }
            hit
        })
        .collect();
    Ok(hits)
}

pub async fn search(context: &CliContext, args: SearchArgs) -> Result<(), CliError> {
    let hits = search_hits(context, &args).await?;
    if hits.is_empty() {
        println!("No results");
    }
    for hit in hits {
        println!("{hit}");
    }
    Ok(())
}
