//! Storage backend implementations

pub mod file;
pub mod mem;

pub use file::FileDatastore;
pub use mem::MemoryDatastore;
