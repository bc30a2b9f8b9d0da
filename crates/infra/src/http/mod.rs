//! HTTP client plumbing

pub mod client;

pub use client::{HttpClient, HttpClientBuilder, RetryPolicy};
