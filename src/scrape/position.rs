// =============================================================================
// scrape/position.rs — DEGREES EAST, DEGREES WEST
// =============================================================================
//
// Listing pages print orbital slots as "156.0°E" or "116.0°W". We turn that
// into a signed number: east positive, west negative.
//
// The page is decoded to UTF-8 before it gets here, so the pattern carries the
// real degree sign. Matching undecoded Latin-1 bytes would need "Â°" instead,
// and would break the moment a page switched encodings.
// =============================================================================

use regex::Regex;
use std::sync::LazyLock;

use crate::error::RowError;

static POSITION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i)([0-9.]+)°([EW])$").expect("position pattern is valid")
});

/// Parse a listing position such as `"156.0°E"` into signed degrees.
///
/// Surrounding whitespace is ignored. A string that does not have the
/// `<number>°<E|W>` shape is a [`RowError::PositionFormat`]; one that has the
/// shape but a broken number (`"116..0°E"`) is a [`RowError::PositionParse`].
pub fn parse_position(text: &str) -> Result<f64, RowError> {
    let trimmed = text.trim();

    let captures = POSITION_PATTERN
        .captures(trimmed)
        .ok_or_else(|| RowError::PositionFormat(trimmed.to_string()))?;

    let degrees: f64 = captures[1].parse().map_err(|e: std::num::ParseFloatError| {
        RowError::PositionParse {
            text: trimmed.to_string(),
            reason: e.to_string(),
        }
    })?;

    if captures[2].eq_ignore_ascii_case("W") {
        Ok(-degrees)
    } else {
        Ok(degrees)
    }
}
