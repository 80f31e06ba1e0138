//! `gator`: a command-line RSS aggregator.
//!
//! Users register, follow feeds, and `gator agg` polls followed feeds on an
//! interval, storing each new post in SQLite for `gator browse`.
//!
//! - [`ingest`] - The polling core: scheduling, one-feed cycles, the poll loop
//! - [`feed`] - HTTP retrieval, RSS parsing, date normalization
//! - [`storage`] - SQLite persistence
//! - [`commands`] - The CLI subcommands
//! - [`config`] / [`context`] - `~/.gatorconfig.json` and the per-run context

pub mod commands;
pub mod config;
pub mod context;
pub mod feed;
pub mod ingest;
pub mod storage;
pub mod util;
