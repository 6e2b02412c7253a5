//! Core types and trait definitions for the Solar Index Spain pipeline.
//!
//! This crate is deliberately free of HTTP and database dependencies. It owns
//! the period arithmetic, the validation gate and the derived-metrics engine;
//! storage backends implement [`store::PeriodStore`] and everything above
//! depends on that abstraction.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod bulletin;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod period;
pub mod record;
pub mod store;
pub mod validate;

pub use error::{Error, Result};
pub use period::Period;
