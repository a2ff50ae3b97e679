//! # FAQ Relay
//!
//! A small question-answering chatbot service backed by multi-collection
//! semantic search.
//!
//! A submitted question triggers one resolution run: concurrent
//! nearest-neighbor queries against the active model family's
//! collections, reconciliation of the surviving hits, and a fallback
//! chain (extractive QA → generative paraphrase → canned apology) when
//! nothing confident enough comes back. The resolved answer is written
//! onto the question record exactly once and pushed to clients over a
//! live stream.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌───────────┐   ┌──────────┐
//! │  HTTP /  │──▶│ Retrieval  │──▶│ Reconcile │──▶│ Fallback │
//! │   CLI    │   │  fan-out   │   │  + gate   │   │  chain   │
//! └────┬─────┘   └─────┬──────┘   └───────────┘   └────┬─────┘
//!      │               │                                │
//!      │         ┌─────▼──────┐                  ┌──────▼─────┐
//!      │         │  Weaviate  │                  │   SQLite   │
//!      └────────▶│  backend   │                  │ questions  │
//!                └────────────┘                  └────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types and the answer wire format |
//! | [`error`] | Typed backend and schema failure types |
//! | [`backend`] | Search backend adapter (trait + Weaviate impl) |
//! | [`retrieval`] | Concurrent retrieval fan-out with settle-all semantics |
//! | [`reconcile`] | Hit normalization, ranking, and the confidence gate |
//! | [`fallback`] | QA-extraction / generative degradation chain |
//! | [`resolve`] | Pipeline orchestration and persistence |
//! | [`store`] | Question store trait and SQLite implementation |
//! | [`schema`] | Admin collection setup and FAQ dataset seeding |
//! | [`server`] | HTTP API and SSE live stream |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod backend;
pub mod config;
pub mod db;
pub mod error;
pub mod fallback;
pub mod migrate;
pub mod models;
pub mod reconcile;
pub mod resolve;
pub mod retrieval;
pub mod schema;
pub mod server;
pub mod store;
