pub mod config;
pub mod logging;
pub mod matcher;
pub mod model;
pub mod normalizer;
pub mod report;
pub mod source;
pub mod storage;

pub use matcher::{MatchOutcome, MatchingEngine};
pub use model::{CombinedProduct, Listing, ListingGroup};
