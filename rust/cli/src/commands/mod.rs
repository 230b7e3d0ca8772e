pub mod build;
pub mod inspect;
pub mod search;
pub mod write_chunks;
