use crate::utils::{CliContext, CliError};
use clap::Parser;
use dumbvec_index::{
    build_from_storage, BuildOptions, ChunkResolver, FieldEmbedding, VectorType, WriteOutcome,
};

#[derive(Parser, Debug)]
pub struct BuildArgs {
    #[clap(long, help = "Name to store the index under")]
    pub(crate) name: String,
    #[clap(
        long = "path",
        required = true,
        help = "Path holding chunk files. Repeat to index several paths in order"
    )]
    pub(crate) paths: Vec<String>,
    #[clap(
        long,
        default_value = "embedding",
        help = "Document field holding the vector"
    )]
    pub(crate) field: String,
    #[clap(long, help = "Encoding of stored vectors, e.g. float32 or int16")]
    pub(crate) vector_type: Option<VectorType>,
    #[clap(long, help = "Drop dimensions whose range is below this value")]
    pub(crate) dimension_threshold: Option<f32>,
    #[clap(long, help = "Scale every vector to unit length")]
    pub(crate) normalize: bool,
    #[clap(long, help = "Replace an index that is already stored")]
    pub(crate) overwrite: bool,
}

pub async fn build(context: &CliContext, args: BuildArgs) -> Result<(), CliError> {
    let index_config = &context.config.index;
    let options = BuildOptions {
        dimension_threshold: args
            .dimension_threshold
            .unwrap_or(index_config.dimension_threshold),
        normalize: args.normalize || index_config.normalize,
    };
    let vector_type = args.vector_type.unwrap_or(index_config.vector_type);
    let overwrite = args.overwrite || index_config.overwrite;

    let resolver =
        ChunkResolver::from_config(context.storage.clone(), &context.config.cache).await?;
    let embed = FieldEmbedding::new(args.field.as_str());
    let built =
        build_from_storage(&context.storage, &args.paths, &embed, options, &resolver).await?;
    tracing::info!(
        name = %args.name,
        entries = built.index.len(),
        dimensions = built.index.dimensions(),
        "Built index"
    );

    let chain = context.index_chain(vector_type).await?;
    let outcomes = chain.write(&args.name, &built.index, overwrite).await?;
    for (tier, outcome) in &outcomes {
        match outcome {
            WriteOutcome::Written => println!("Wrote index {} to {}", args.name, tier),
            WriteOutcome::Skipped => println!(
                "Index {} already in {}, pass --overwrite to replace it",
                args.name, tier
            ),
        }
    }
    // The mask belongs to whatever index storage now holds. Storage is the
    // last tier of the chain.
    let stored = matches!(outcomes.last(), Some((_, WriteOutcome::Written)));
    if stored {
        match &built.mask {
            Some(mask) => {
                context.write_mask(&args.name, mask, true).await?;
                println!(
                    "Wrote mask keeping {} of {} dimensions",
                    mask.kept(),
                    mask.width()
                );
            }
            None => context.delete_mask(&args.name).await?,
        }
    }
    println!(
        "{} entries, {} dimensions, {} files, encoded as {}",
        built.index.len(),
        built.index.dimensions(),
        built.index.files().len(),
        vector_type
    );
    Ok(())
}
