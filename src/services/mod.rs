//! Sync engine services, leaves first.

pub mod catalog_service;
pub mod credential_service;
pub mod dispatcher;
pub mod downloader;
pub mod local_index;
pub mod object_storage;
pub mod path_resolver;
pub mod reconciler;
pub mod reporter;
pub mod sync_service;
