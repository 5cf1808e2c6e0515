//! Page retrieval and parsing for storefront listing and detail pages.

pub mod detail;
pub mod error;
pub mod fetch;
pub mod listing;
mod retry;
mod state;

pub use detail::{parse_detail, ProductDetail, StateStatus};
pub use error::FetchError;
pub use fetch::{is_block_page, snapshot_path, HttpPageFetcher, PageFetcher};
pub use listing::{entries_from_url_list, parse_listing, ListingPage};
