//! Test module for warmtab-core
//!
//! Tests drive the pool and dispatcher against an in-memory browser with
//! tokio's paused clock, covering:
//! - Identifier persistence across restarts
//! - Pool capacity, liveness checks, reveal and adoption
//! - Reactions to tab, window and focus events
//! - Query building, delivery retries and fallbacks
//! - Rule matching and configuration loading

mod fixtures;
