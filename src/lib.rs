//! Jobgate - fixed-window rate limiting for the job board API
//!
//! This crate implements the in-memory, per-process request rate limiter
//! that guards the job board's API routes. Each policy counts requests per
//! key in fixed windows, answers with quota headers, and rejects with a
//! structured 429 once a key exceeds its limit.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;

pub use error::{JobgateError, RateLimitExceeded, Result};
pub use http::{rate_limit, RateLimitLayer};
pub use ratelimit::{RateLimitPolicy, RateLimiter, RateLimiters};
