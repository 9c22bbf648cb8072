//! # Document QA
//!
//! A document ingestion and retrieval-augmented question-answering service.
//!
//! Documents (PDF, Word, plain text, Markdown, presentations) are split
//! into overlapping chunks, embedded with a local sentence-transformer
//! model, and stored in a SQLite vector index keyed by filename. Questions
//! are answered by retrieving the most similar chunks and prompting a
//! generative model with them as the only allowed context.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────┐   ┌───────────┐
//! │ Documents │──▶│   Pipeline     │──▶│  SQLite    │
//! │ pdf/docx/ │   │ Extract+Chunk │   │ embeddings │
//! │ txt/pptx  │   │   +Embed      │   │ by chunk   │
//! └──────────┘   └───────────────┘   └─────┬─────┘
//!                                          │
//!                      ┌───────────────────┤
//!                      ▼                   ▼
//!                 ┌──────────┐       ┌──────────┐
//!                 │   CLI    │       │   HTTP   │
//!                 │  (dqa)   │       │  (axum)  │
//!                 └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! dqa init                          # create the vector store
//! dqa ingest ./docs/handbook.pdf    # index a document
//! dqa ask "How do refunds work?"    # grounded answer from the CLI
//! dqa serve                         # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Config file loading and validation |
//! | [`extract`] | Per-format text extraction |
//! | [`chunk`] | Overlapping character-window chunking |
//! | [`embedding`] | Embedding abstraction and the fastembed backend |
//! | [`store`] | Vector store trait, SQLite and in-memory backends |
//! | [`ingest`] | Document ingestion pipeline |
//! | [`retrieve`] | Query-time similarity retrieval |
//! | [`generate`] | Answer generation backends |
//! | [`answer`] | Grounding prompt and fallback sentinels |
//! | [`server`] | HTTP API server |
//! | [`error`] | Pipeline error kinds |

pub mod answer;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generate;
pub mod ingest;
pub mod retrieve;
pub mod server;
pub mod store;
