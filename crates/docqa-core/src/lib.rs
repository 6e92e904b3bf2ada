//! # docqa-core
//!
//! Storage- and transport-agnostic logic for docqa: data models, error
//! taxonomy, chunking, the embedding client, the vector store contract,
//! retrieval, catalog grouping, and answer synthesis.
//!
//! This crate performs no filesystem or network I/O. Concrete providers,
//! the SQLite store, and the ingestion pipeline live in the `docqa` crate.

pub mod answer;
pub mod catalog;
pub mod chunk;
pub mod embedding;
pub mod error;
pub mod models;
pub mod retrieval;
pub mod store;
