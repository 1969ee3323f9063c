// =============================================================================
// scrape/record_builder.rs — ONE ROW IN, ONE RECORD OUT
// =============================================================================
//
// A listing row has either five cells or four:
//
//   [marker] [position] [name + link] [band] [date]     full row
//   [marker]            [name + link] [band] [date]     rowspan continuation
//
// Continuation rows sit under a position cell that spans several rows, so
// they inherit the last position seen on the same page. That inherited value
// travels as an explicit CarryOver: it goes in with each row and comes back
// out with the result. A failed row hands the incoming CarryOver back as-is.
// =============================================================================

use regex::Regex;
use std::sync::LazyLock;

use crate::config::Config;
use crate::error::{ConfigError, RowError};
use crate::models::Record;
use crate::scrape::position::parse_position;

/// Parenthetical tail of a name cell, e.g. ` (incl. 0.6°)`.
static NAME_TAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\W*\(.*$").expect("name tail pattern is valid"));

/// A link with no scheme separator anywhere is relative to the site root.
static RELATIVE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^:]*$").expect("relative url pattern is valid"));

/// Text and first link of one table cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawCell {
    pub text: String,
    pub link: Option<String>,
}

/// One table row, cells in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    pub cells: Vec<RawCell>,
}

impl RawRow {
    /// Cell texts, compacted for error messages.
    pub fn describe(&self) -> String {
        let texts: Vec<String> = self
            .cells
            .iter()
            .map(|c| c.text.split_whitespace().collect::<Vec<_>>().join(" "))
            .collect();
        format!("{:?}", texts)
    }
}

/// Position inherited by rowspan continuation rows.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CarryOver {
    position: Option<f64>,
}

impl CarryOver {
    pub fn with_position(position: f64) -> Self {
        Self {
            position: Some(position),
        }
    }

    pub fn position(&self) -> Option<f64> {
        self.position
    }
}

/// Link validation rules, compiled once per run.
#[derive(Debug, Clone)]
pub struct RowRules {
    base_url: String,
    record_url: Regex,
}

impl RowRules {
    pub fn new(base_url: &str, record_url_pattern: &str) -> Result<Self, ConfigError> {
        let record_url = Regex::new(record_url_pattern).map_err(|source| ConfigError::Pattern {
            pattern: record_url_pattern.to_string(),
            source,
        })?;

        Ok(Self {
            base_url: base_url.to_string(),
            record_url,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Self::new(&config.base_url, &config.record_url_pattern)
    }

    /// Accept a link that matches the allow-pattern, prefix a relative one
    /// with the base URL, reject anything else.
    pub fn resolve_url(&self, link: &str) -> Result<String, RowError> {
        if self.record_url.is_match(link) {
            return Ok(link.to_string());
        }

        if RELATIVE_URL.is_match(link) {
            return Ok(format!("{}{}", self.base_url, link));
        }

        Err(RowError::UrlFormat {
            url: link.to_string(),
            pattern: self.record_url.as_str().to_string(),
        })
    }
}

/// Strip the parenthetical tail and surrounding whitespace from a name cell.
pub fn clean_name(raw: &str) -> Result<String, RowError> {
    let name = NAME_TAIL.replace(raw.trim(), "");
    let name = name.trim();

    if name.is_empty() {
        Err(RowError::NameEmpty)
    } else {
        Ok(name.to_string())
    }
}

/// Turn one row into a record.
///
/// Returns the row's outcome together with the carry-over for the next row.
/// On success the carry-over holds this row's position; on failure it is the
/// one passed in, untouched.
pub fn build_record(
    row: &RawRow,
    carry: CarryOver,
    rules: &RowRules,
) -> (Result<Record, RowError>, CarryOver) {
    match try_build(row, carry, rules) {
        Ok(record) => {
            let next = CarryOver::with_position(record.position);
            (Ok(record), next)
        }
        Err(e) => (Err(e), carry),
    }
}

fn try_build(row: &RawRow, carry: CarryOver, rules: &RowRules) -> Result<Record, RowError> {
    let cells = &row.cells;
    let count = cells.len();

    if count != 4 && count != 5 {
        return Err(RowError::RowShape(count));
    }

    let position = if count == 5 {
        parse_position(&cells[1].text)?
    } else {
        carry.position().ok_or(RowError::MissingPosition)?
    };

    let name_cell = &cells[count - 3];
    let name = clean_name(&name_cell.text)?;

    let link = name_cell.link.as_deref().ok_or(RowError::UrlMissing)?;
    let url = rules.resolve_url(link)?;

    let band = cells[count - 2].text.trim().to_string();

    Ok(Record {
        name,
        position,
        url,
        band,
    })
}
