//! Graph cache integration suite
//!
//! Exercises the environment end to end: payload writes, reads, change
//! notification, retention and GC, `execute` against a scripted network,
//! and the fragment spec resolver.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test cache
//!
//! # One area only
//! cargo test --test cache retention::
//! ```

#[path = "../common/mod.rs"]
mod common;

mod config;
mod execute;
mod properties;
mod reads;
mod resolver;
mod retention;
mod subscriptions;
