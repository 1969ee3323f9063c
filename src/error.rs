// =============================================================================
// error.rs — EVERYTHING THAT CAN GO WRONG BETWEEN A WEB PAGE AND A HASH
// =============================================================================
//
// Three tiers, from finest to coarsest:
//
//   RowError    one table row could not become a record; siblings carry on
//   ScrapeError one page (or one row of it) failed; collected, never thrown
//   StoreError  the snapshot store refused something
//
// Scrape errors only ever surface as the aggregated list at the end of a run.
// A non-empty list is what stops the run before storage is touched.
// =============================================================================

use thiserror::Error;

/// Why a single listing row was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RowError {
    #[error("wrong row shape: expected 4 or 5 cells, got {0}")]
    RowShape(usize),

    #[error("position {0:?} does not look like <degrees>°<E|W>")]
    PositionFormat(String),

    #[error("position {text:?} has an unparsable number: {reason}")]
    PositionParse { text: String, reason: String },

    #[error("row has no position cell and no earlier row to inherit one from")]
    MissingPosition,

    #[error("name is empty after cleanup")]
    NameEmpty,

    #[error("name cell has no link")]
    UrlMissing,

    #[error("link {url:?} does not match allowed pattern {pattern:?}")]
    UrlFormat { url: String, pattern: String },
}

/// A failure while harvesting one source page.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("cannot fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("cannot decode body of {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("cannot parse document {url}: {reason}")]
    DocumentParse { url: String, reason: String },

    #[error("{url} row {row}: {source}. Data: {cells}")]
    Row {
        url: String,
        row: usize,
        cells: String,
        #[source]
        source: RowError,
    },
}

impl ScrapeError {
    /// The row-level cause, if this error is about a single row.
    pub fn row_error(&self) -> Option<&RowError> {
        match self {
            ScrapeError::Row { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Persistence failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot connect to store: {0}")]
    Connection(#[source] redis::RedisError),

    #[error("cannot load snapshot: {0}")]
    Load(#[source] redis::RedisError),

    #[error("snapshot entry {name:?} is not a valid record: {source}")]
    Snapshot {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot encode {name:?}: {source}")]
    Encode {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("write for {name:?} was refused: {source}")]
    Statement {
        name: String,
        #[source]
        source: redis::RedisError,
    },

    #[error("{operation} batch was not committed: {source}")]
    Commit {
        operation: &'static str,
        #[source]
        source: redis::RedisError,
    },
}

/// Startup configuration problems. These abort before any work starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("base URL {value:?} is invalid: {reason}")]
    BaseUrl { value: String, reason: String },

    #[error("source page {value:?} cannot be resolved: {reason}")]
    SourcePage { value: String, reason: String },

    #[error("record URL pattern {pattern:?} does not compile: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("no source pages configured")]
    NoSourcePages,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_error_message_includes_context() {
        let err = ScrapeError::Row {
            url: "https://www.lyngsat.com/asia.html".to_string(),
            row: 3,
            cells: "[\"\", \"ABS 7\", \"Ku\", \"120507\"]".to_string(),
            source: RowError::MissingPosition,
        };
        let msg = err.to_string();
        assert!(msg.contains("asia.html row 3"));
        assert!(msg.contains("no position cell"));
        assert!(msg.contains("ABS 7"));
        assert_eq!(err.row_error(), Some(&RowError::MissingPosition));
    }

    #[test]
    fn test_page_errors_have_no_row_cause() {
        let err = ScrapeError::Fetch {
            url: "https://www.lyngsat.com/europe.html".to_string(),
            reason: "status 503".to_string(),
        };
        assert!(err.row_error().is_none());
    }
}
