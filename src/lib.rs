//! Turnstile - Per-Host Request Admission Control
//!
//! This crate implements an in-process rate limiter for HTTP intermediaries.
//! Each request key (typically the `Host` header) gets a fixed-window bucket
//! of admissions, keys matching a configured whitelist bypass the limiter,
//! and the set of tracked keys is bounded by LRU capacity or idle expiry.

pub mod config;
pub mod error;
pub mod filter;
pub mod ratelimit;
