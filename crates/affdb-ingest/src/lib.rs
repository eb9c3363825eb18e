//! Affiliate catalog ingestion pipeline.
//!
//! Raw records flow through [`normalize`], the hard filters, the quality
//! [`score`], the admission floor, [`fingerprint`] and [`resolve`] before the
//! [`ProductStore`] is touched. [`run_ingestion`] drives that pipeline over a
//! paged [`SourceClient`].

pub mod error;
pub mod filter;
pub mod fingerprint;
pub mod normalize;
pub mod orchestrator;
pub mod pipeline;
pub mod price;
pub mod quality;
pub mod resolve;
pub mod retry;
pub mod source;
pub mod store;
pub mod summary;

pub use affdb_core::{FilterRules, KeywordTable, ScoringTable, Tuning};
pub use error::{SourceError, StoreError, Transient};
pub use filter::{FilterError, HardFilters};
pub use fingerprint::{fingerprint, Fingerprint};
pub use normalize::{normalize, RawItem, Rejection};
pub use orchestrator::{run_ingestion, RunOptions, MAX_PAGES};
pub use pipeline::{Candidate, Pipeline};
pub use quality::{score, QualitySignals};
pub use resolve::{resolve, Resolution, ResolutionAction};
pub use retry::{retry_transient, RetryPolicy};
pub use source::{Page, SourceClient};
pub use store::{MemoryProductStore, ProductRecord, ProductStore};
pub use summary::{IngestionState, IngestionSummary, SkipReason, StopReason};
