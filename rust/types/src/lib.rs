mod document;
mod index;

// Re-export the modules so that callers can use a single import.
pub use document::*;
pub use index::*;
