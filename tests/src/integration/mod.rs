//! # Integration Tests
//!
//! Two real peers (or one peer and a hand-driven transport end) exchanging
//! frames over one link.

pub mod robustness;
pub mod scenarios;
pub mod transports;
