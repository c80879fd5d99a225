pub mod catalog;
pub mod engine;
pub mod requester;

pub use catalog::{BidderCatalog, BidderEntry};
pub use engine::run_auction;
pub use requester::{BidderOutcome, BidderRequester, HttpBidderRequester};
