//! Storage contracts and the file operations built on them.

pub mod blob_store;
pub mod file_service;
pub mod metadata_store;
pub mod numeric;

#[cfg(test)]
pub mod testing;
