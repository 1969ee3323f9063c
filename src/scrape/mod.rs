// =============================================================================
// scrape/mod.rs — FROM LISTING PAGES TO RECORDS
// =============================================================================
//
// Leaves first:
//
//   position        "156.0°E" -> 156.0
//   record_builder  one row + carry-over -> one record (or one row error)
//   table_selector  which tables on a page are live listings
//   page_parser     drives the two above over a page, streaming results
//   fetcher         GET + charset decode
//   orchestrator    one task per page, one aggregator, sorted output
// =============================================================================

pub mod fetcher;
pub mod orchestrator;
pub mod page_parser;
pub mod position;
pub mod record_builder;
pub mod table_selector;

pub use orchestrator::{scrape_all, ScrapeContext, ScrapeOutcome};
pub use record_builder::RowRules;
