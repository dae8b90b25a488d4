//! # RAG Sentinel
//!
//! A defense-in-depth guard layer for retrieval-augmented generation
//! pipelines. RAG Sentinel tracks document provenance, watches retrieval
//! patterns for drift, scans the embedding space for outliers, and guards
//! retrieved context against prompt injection and content mutation before
//! it reaches answer generation.
//!
//! All guard stages are advisory: detections are surfaced to the operator
//! and written to an append-only audit ledger, but never block the
//! pipeline (WARN mode).
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌─────────────────┐   ┌──────────┐
//! │  Corpus   │──▶│ Ingestion Gate   │──▶│  SQLite   │
//! │ (files)   │   │ hash/trust/chunk │   │ + vectors │
//! └───────────┘   └────────┬────────┘   └────┬─────┘
//!                          │                 │
//!                   audit ledger       query pipeline
//!                                            │
//!                    rerank → drift → guard → mutation → answer
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! sentinel init                      # create database
//! sentinel ingest                    # ingest the corpus
//! sentinel baseline                  # build the reference embedding
//! sentinel query "password rules?"   # guarded question answering
//! sentinel scan                      # embedding outlier sweep
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`audit`] | Append-only provenance ledger |
//! | [`trust`] | Trust classification strategies |
//! | [`chunk`] | Overlapping text chunking |
//! | [`ingest`] | Ingestion gate (hash, dedup, store) |
//! | [`store`] | SQLite vector store |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`generation`] | Text-generation provider abstraction |
//! | [`stats`] | Retrieval statistics and drift detection |
//! | [`outlier`] | Embedding-space outlier detection |
//! | [`guard`] | Context blocklist + baseline drift guard |
//! | [`mutation`] | LLM + heuristic content mutation detector |
//! | [`rerank`] | Trust-aware reranking |
//! | [`query`] | Guarded query pipeline |
//! | [`vecmath`] | Cosine similarity and norms |

pub mod audit;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod generation;
pub mod guard;
pub mod ingest;
pub mod models;
pub mod mutation;
pub mod outlier;
pub mod query;
pub mod rerank;
pub mod stats;
pub mod store;
pub mod trust;
pub mod vecmath;
