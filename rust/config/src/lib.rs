use async_trait::async_trait;
use dumbvec_error::DumbvecError;

/// A component that can be constructed from a configuration struct.
///
/// Configuration structs are plain serde types owned by the crate that
/// consumes them; this trait is the single seam through which the binary
/// turns a loaded config into live components (storage handles, caches).
#[async_trait]
pub trait Configurable<T, E = Box<dyn DumbvecError>> {
    async fn try_from_config(config: &T) -> Result<Self, E>
    where
        Self: Sized;
}
