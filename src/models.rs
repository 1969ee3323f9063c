// =============================================================================
// models.rs — THE RECORDS OF THE CLARKE BELT
// =============================================================================
//
// One geostationary relay per record. The listing pages describe each one by
// name, orbital position, a link to its detail page, and the bands it carries.
// The same struct is used for freshly scraped rows and for the snapshot loaded
// back out of storage, so the two sides can be compared field by field.
// =============================================================================

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// One harvested relay listing.
///
/// `name` is the natural key: reconciliation matches scraped and stored
/// records by name alone and treats every other field as payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Display name with parenthetical notes (inclination etc.) stripped.
    pub name: String,

    /// Orbital position in degrees. East is positive, west is negative.
    pub position: f64,

    /// Absolute link to the relay's detail page.
    pub url: String,

    /// Frequency bands as printed in the listing, e.g. `"Ku"`. May be empty.
    pub band: String,
}

impl Record {
    /// Ordering used for the aggregated scrape output: position first,
    /// then name so relays sharing a slot come out in a stable order.
    /// 0°W and 0°E are the same slot.
    pub fn cmp_by_position_name(&self, other: &Self) -> Ordering {
        self.position
            .partial_cmp(&other.position)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hemisphere = if self.position < 0.0 { 'W' } else { 'E' };
        write!(
            f,
            "{} @ {:.1}°{} [{}] {}",
            self.name,
            self.position.abs(),
            hemisphere,
            self.band,
            self.url
        )
    }
}

/// Sort records into the canonical `(position, name)` order.
pub fn sort_by_position_name(records: &mut [Record]) {
    records.sort_by(Record::cmp_by_position_name);
}

#[cfg(test)]
pub(crate) fn record(name: &str, position: f64) -> Record {
    Record {
        name: name.to_string(),
        position,
        url: format!("https://www.lyngsat.com/{}.html", name.replace(' ', "-")),
        band: String::new(),
    }
}
