//! Mirror a remote photo catalog into `<root>/<group>/<file>`.
//!
//! Downloads what is missing through signed object-storage URLs and removes
//! local files the catalog no longer references.

pub mod config;
pub mod errors;
pub mod models;
pub mod services;
