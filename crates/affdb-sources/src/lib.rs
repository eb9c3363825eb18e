//! Concrete [`affdb_ingest::SourceClient`] implementations.

pub mod client;
mod paging;

pub use client::FeedClient;
