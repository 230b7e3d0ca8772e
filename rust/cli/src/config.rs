use dumbvec_cache::CacheConfig;
use dumbvec_distance::SimilarityMetric;
use dumbvec_index::{BuildOptions, VectorType};
use dumbvec_storage::config::StorageConfig;
use dumbvec_tracing::LogFilter;
use figment::providers::{Env, Format, Yaml};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "./dumbvec_config.yaml";

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RootConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub log_filters: Vec<LogFilter>,
}

/// Defaults for building and searching indexes. Command line flags win over
/// these.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct IndexConfig {
    /// Key prefix that indexes and their masks are stored under.
    #[serde(default = "IndexConfig::default_index_prefix")]
    pub index_prefix: String,
    #[serde(default)]
    pub vector_type: VectorType,
    #[serde(default)]
    pub dimension_threshold: f32,
    #[serde(default)]
    pub normalize: bool,
    #[serde(default)]
    pub metric: SimilarityMetric,
    #[serde(default)]
    pub overwrite: bool,
}

impl IndexConfig {
    fn default_index_prefix() -> String {
        "indexes".to_string()
    }

    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            dimension_threshold: self.dimension_threshold,
            normalize: self.normalize,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            index_prefix: Self::default_index_prefix(),
            vector_type: VectorType::default(),
            dimension_threshold: 0.0,
            normalize: false,
            metric: SimilarityMetric::default(),
            overwrite: false,
        }
    }
}

impl RootConfig {
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Reads `path` (if it exists) and overlays `DUMBVEC_` environment
    /// variables. `__` in a variable name separates nesting levels, so
    /// `DUMBVEC_STORAGE__LOCAL__ROOT` sets `storage.local.root`.
    pub fn load_from_path(path: &str) -> Result<Self, Box<figment::Error>> {
        // figment splits nested keys on `.`, but variable names cannot
        // contain one.
        let mut f = figment::Figment::from(
            Env::prefixed("DUMBVEC_").map(|k| k.as_str().replace("__", ".").into()),
        );
        if std::path::Path::new(path).exists() {
            f = figment::Figment::from(Yaml::file(path)).merge(f);
        }
        f.extract().map_err(Box::new)
    }
}
