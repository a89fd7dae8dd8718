//! # Profile Harvest
//!
//! Multi-source public profile ingestion with a canonical store and a small
//! set of analytic tools.
//!
//! Five source adapters (GitHub, StackOverflow, ORCID, Kaggle, LinkedIn)
//! discover public identities, normalize each into one
//! [`CanonicalProfile`](models::CanonicalProfile), and upsert it into a
//! SQLite store keyed by `(platform, id)`. Every adapter shares a
//! [`RateGovernor`](governor::RateGovernor) that paces requests, backs off
//! on throttling, and stops a run once it only sees profiles it already has.
//! The stored profiles are exposed through read-only analytic tools over a
//! JSON HTTP API and MCP.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────┐
//! │  Adapters   │──▶│ Normalizer  │──▶│  SQLite   │
//! │ + Governor  │   │  + Upsert   │   │ FTS5 idx  │
//! └─────────────┘   └─────────────┘   └────┬─────┘
//!                                          │
//!                      ┌───────────────────┤
//!                      ▼                   ▼
//!                 ┌──────────┐       ┌──────────┐
//!                 │   CLI    │       │   HTTP   │
//!                 │(harvest) │       │  (MCP)   │
//!                 └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! harvest init                       # create the store
//! harvest sources                    # check adapter readiness
//! harvest sync all                   # run every enabled adapter
//! harvest sync github --target 50    # one adapter, custom target
//! harvest query find_top_experts --param skill=Rust
//! harvest serve                      # HTTP + MCP tool server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`models`] | Canonical profile and metric types |
//! | [`normalize`] | Field coercion, emails, skill extraction |
//! | [`governor`] | Pacing, throttle backoff, duplicate saturation |
//! | [`http`] | Header-rotating fetcher with tri-state results |
//! | [`adapter`] | Discovery loop and the adapter set |
//! | [`store`] | Profile persistence (SQLite and in-memory) |
//! | [`analytics`] | Aggregate queries over stored profiles |
//! | [`ingest`] | Ingestion pass orchestration |
//! | [`traits`] | Analytic tools and their registry |
//! | [`server`] | HTTP tool server |
//! | [`mcp`] | MCP bridge over the tool registry |

pub mod adapter;
pub mod adapter_github;
pub mod adapter_kaggle;
pub mod adapter_linkedin;
pub mod adapter_orcid;
pub mod adapter_stackoverflow;
pub mod analytics;
pub mod config;
pub mod db;
pub mod governor;
pub mod http;
pub mod ingest;
pub mod mcp;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod search;
pub mod server;
pub mod sources;
pub mod stats;
pub mod store;
pub mod traits;
