//! HTTP client module
//!
//! Provides the authenticated API client and the shared rate limiter.
//!
//! # Features
//!
//! - **Authentication**: Bearer token plus fixed `Accept`/API-version headers
//! - **Rate Limiting**: Token bucket rate limiter using governor
//! - **Error Classification**: Throttling, server and client errors are told apart

mod client;
mod rate_limit;

pub use client::{
    HttpClient, HttpClientConfig, HttpClientConfigBuilder, RequestConfig, GITHUB_ACCEPT,
    GITHUB_API_VERSION,
};
pub use rate_limit::{RateLimiter, RateLimiterConfig};

#[cfg(test)]
mod tests;
