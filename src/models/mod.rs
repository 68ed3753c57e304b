//! Data types for the file-upload service.
//!
//! Events coming in, items held by the metadata store, file records and
//! route bodies, and the response envelope going out.

pub mod attribute;
pub mod event;
pub mod file_record;
pub mod response;
