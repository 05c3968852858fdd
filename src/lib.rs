// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # kg-merge
//!
//! Identifier reconciliation and edge merging for biomedical knowledge graphs.
//!
//! Several independently produced sources (BioKDE, iKraph, PrimeKG, SemMedDB,
//! or any source described in config) are read as streams of raw edges whose
//! endpoints use source-local identifiers. Each endpoint is resolved to a
//! canonical CURIE, filtered against a subset of allowed nodes, deduplicated
//! across all sources, and emitted as one fixed-schema JSON Lines record.
//!
//! ## Architecture
//!
//! - **Input** (`table`, `reader`): plain or gzip delimited text, one record at a time
//! - **Identifier mapping** (`mapping`): lookup tables + per-source strategy chains
//! - **Subset** (`subset`): the allow-list of canonical endpoint ids
//! - **Records** (`record`, `ledger`): deterministic edge identity and exactly-once emission
//! - **Engine** (`engine`): per-source state machine and statistics
//! - **Nodes** (`nodes`, `category`): canonical node records with Biolink categories
//! - **Output** (`output`, `pipeline`): JSONL writers, summary file, end-to-end runs
//!
//! ## Library usage
//!
//! ```no_run
//! use kg_merge::config::MergeConfig;
//! use kg_merge::pipeline::{Pipeline, PipelineOptions};
//!
//! let config = MergeConfig::load(std::path::Path::new("merge.toml")).unwrap();
//! let pipeline = Pipeline::new(config, PipelineOptions::default());
//! let summary = pipeline
//!     .write_edges(std::path::Path::new("merged_edges.jsonl"), None)
//!     .unwrap();
//! println!("emitted {} edges", summary.total_emitted);
//! ```

pub mod category;
pub mod config;
pub mod curie;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod mapping;
pub mod nodes;
pub mod output;
pub mod pipeline;
pub mod reader;
pub mod record;
pub mod subset;
pub mod table;
