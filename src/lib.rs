//! Research News - an RSS news aggregator
//!
//! Fetches a fixed registry of research feeds concurrently, normalizes their
//! entries and serves one recency-ordered list over HTTP.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod routes;
