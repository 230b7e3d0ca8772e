use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "snake_case")]
/// The configuration for the chosen storage.
/// # Options
/// - Local: keys are files below a root directory.
/// - ObjectStore: keys are objects in a bucket (S3, Minio, or in-memory).
pub enum StorageConfig {
    Local(LocalStorageConfig),
    ObjectStore(ObjectStoreConfig),
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Local(LocalStorageConfig::default())
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
/// The configuration for the local storage type
/// # Fields
/// - root: The root directory to use for storage.
pub struct LocalStorageConfig {
    #[serde(default = "LocalStorageConfig::default_root")]
    pub root: String,
}

impl LocalStorageConfig {
    fn default_root() -> String {
        "./dumbvec_data".to_string()
    }
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        LocalStorageConfig {
            root: Self::default_root(),
        }
    }
}

#[derive(Deserialize, Serialize, PartialEq, Debug, Clone)]
#[serde(rename_all = "snake_case")]
pub enum ObjectStoreType {
    #[serde(alias = "S3")]
    S3,
    #[serde(alias = "Minio")]
    Minio,
    #[serde(alias = "Memory")]
    Memory,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ObjectStoreBucketConfig {
    pub name: String,
    pub r#type: ObjectStoreType,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ObjectStoreConfig {
    pub bucket: ObjectStoreBucketConfig,
    #[serde(default = "ObjectStoreConfig::default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    #[serde(default = "ObjectStoreConfig::default_minio_endpoint")]
    pub minio_endpoint: String,
}

impl ObjectStoreConfig {
    fn default_max_concurrent_requests() -> usize {
        16
    }

    fn default_minio_endpoint() -> String {
        "http://localhost:9000".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_storage_configs() {
        let local: StorageConfig =
            serde_json::from_str(r#"{"local": {"root": "/data"}}"#).unwrap();
        match local {
            StorageConfig::Local(c) => assert_eq!(c.root, "/data"),
            other => panic!("unexpected {other:?}"),
        }

        let remote: StorageConfig = serde_json::from_str(
            r#"{"object_store": {"bucket": {"name": "vectors", "type": "minio"}}}"#,
        )
        .unwrap();
        match remote {
            StorageConfig::ObjectStore(c) => {
                assert_eq!(c.bucket.name, "vectors");
                assert_eq!(c.bucket.r#type, ObjectStoreType::Minio);
                assert_eq!(c.max_concurrent_requests, 16);
                assert_eq!(c.minio_endpoint, "http://localhost:9000");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
