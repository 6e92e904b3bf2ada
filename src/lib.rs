//! # docqa
//!
//! Retrieval-augmented question answering over uploaded documents.
//!
//! Documents are split into overlapping chunks, embedded, and stored in a
//! SQLite-backed vector index. Questions are embedded the same way, matched
//! against the index, and the best passages are handed to a language model
//! that writes an answer grounded in them.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌─────────────────────────┐   ┌──────────┐
//! │   Upload   │──▶│ Extract → Chunk → Embed │──▶│  SQLite  │
//! │ txt/md/pdf │   │   (IngestionPipeline)   │   │  vectors │
//! └────────────┘   └─────────────────────────┘   └────┬─────┘
//!                                                      │
//!          ┌──────────┐   ┌──────────────┐             │
//!          │ Question │──▶│  Retriever   │◀────────────┘
//!          └──────────┘   └──────┬───────┘
//!                                ▼
//!                        ┌──────────────┐
//!                        │  LLM answer  │
//!                        └──────────────┘
//! ```
//!
//! Storage-independent logic (chunking, the embedding client, retrieval,
//! prompt building) lives in `docqa-core`; this crate adds configuration,
//! disk and network I/O, the CLI, and the HTTP API.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite vector store |
//! | [`extract`] | Text extraction (txt, md, pdf) |
//! | [`retry`] | HTTP retry with backoff |
//! | [`embedding`] | Gemini, OpenAI, and Ollama embedding providers |
//! | [`llm`] | Gemini, OpenAI, and Ollama answer generation |
//! | [`ingest`] | Upload ingestion pipeline |
//! | [`documents`] | Document listing and deletion |
//! | [`ask`] | Retrieval and Q&A commands |
//! | [`health`] | Health report |
//! | [`services`] | Dependency wiring |
//! | [`server`] | HTTP API |

pub mod ask;
pub mod config;
pub mod db;
pub mod documents;
pub mod embedding;
pub mod extract;
pub mod health;
pub mod ingest;
pub mod llm;
pub mod migrate;
pub mod retry;
pub mod server;
pub mod services;
pub mod sqlite_store;
