//! Market Signal Engine
//!
//! Confidence-scored trading signals from per-symbol price windows.
//!
//! ## Architecture
//!
//! ```text
//! PriceData window → AnalysisEngine → [Growth, Fall, Continuous, Volume,
//!                                      OpenInterest, Counter] → FilterChain → Signal channel
//!                                                      │                                │
//!                                          CounterEvent channel ──→ NotificationDispatcher → Notifier
//! ```

pub mod analysis;
pub mod config;
pub mod counter;
pub mod engine;
pub mod error;
pub mod filter;
pub mod notify;
pub mod open_interest;
pub mod registry;
pub mod types;

#[cfg(test)]
mod types_tests;
