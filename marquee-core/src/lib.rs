//! # Marquee Core
//!
//! Core library for the Marquee streaming back end: watch-progress
//! reconciliation, repository ports and their adapters, embed URL builders
//! and upstream clients.
//!
//! ## Overview
//!
//! - **Playback**: the playtime batch writer and the last-used-source resolver
//! - **Sources**: canonical/legacy source normalization and per-provider
//!   embed URL construction
//! - **Rate limiting**: fixed-window limiter trait and an in-memory store
//! - **Database**: async repository ports with PostgreSQL and in-memory
//!   implementations, aggregated by [`application::unit_of_work::AppUnitOfWork`]
//! - **Providers**: TMDB metadata pass-through and an OpenAI-compatible chat
//!   client
//!
//! ## Feature Flags
//!
//! - `database`: enables the PostgreSQL adapters and embedded migrations

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

/// Application-level composition (unit of work)
pub mod application;

/// Password hashing
pub mod auth;

/// Repository ports and adapters
pub mod database;

#[cfg(feature = "database")]
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Error types
pub mod error;

/// Playtime batching and source preference reconciliation
pub mod playback;

/// Upstream clients (metadata, chat)
pub mod providers;

/// Fixed-window request limiting
pub mod rate_limit;

/// Video source normalization and embed URLs
pub mod sources;

/// Visitor log helpers
pub mod visitors;

pub use error::{MarqueeError, Result};
pub use marquee_model as model;
