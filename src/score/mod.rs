//! Scoring: percentile-rank aggregation, composite combination, extremes.

pub mod combine;
pub mod extremes;
pub mod rank;

pub use combine::{blend, grand_overall, MetaMatrix, MetaReviewer, MetaVector, RELEVANCE};
pub use extremes::ExtremesTracker;
pub use rank::{aggregate, strict_percentile_rank};
