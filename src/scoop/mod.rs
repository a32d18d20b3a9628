//! Scoop module: keyword search over crawled snapshots
//!
//! The scooper never talks to the crawler directly. It reads the snapshot
//! tree and the dead ledger, watches the keyword file and the run-complete
//! marker, and writes the results store.

mod corpus;
mod engine;
mod keywords;
mod results;
mod search;
mod signal;

pub use corpus::{enumerate, CorpusEntry};
pub use engine::{PollOutcome, WatchEngine};
pub use keywords::KeywordSet;
pub use results::{HistoryEntry, Hit, KeywordResult, Merge, ResultsStore, Trigger};
pub use search::{search, snippets, SnippetOptions};
pub use signal::WatchedValue;
