//! State module for site health and cycle signals
//!
//! # Components
//!
//! - `DeadLedger`: which sites are excluded from crawling, and until when
//! - `FailureTally`: the consecutive-failure streak that feeds the ledger
//! - `RunMarker`: the timestamp file written after each full crawl cycle

mod failures;
mod ledger;
mod marker;

pub use failures::{FailureKind, FailureTally};
pub use ledger::{DeadEntry, DeadLedger};
pub use marker::RunMarker;
