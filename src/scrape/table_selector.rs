// =============================================================================
// scrape/table_selector.rs — WHICH TABLES ARE DATA
// =============================================================================
//
// The listing pages use tables for everything: page layout, navigation,
// archived listings and the live listings we want. Two tests pick out the
// live ones:
//
// 1. Leaf tables only. A table with another table inside it is scaffolding.
// 2. The live listings render their position cells in a specific font face;
//    archived tables use a different one. No marker, no harvest.
//
// Skipped tables are not errors. Most of every page is skipped.
// =============================================================================

use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

static TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("table selector is valid"));

/// Tables that carry live listing rows, in document order.
pub fn select_listing_tables<'a>(document: &'a Html, marker: &str) -> Vec<ElementRef<'a>> {
    document
        .select(&TABLE)
        .filter(|table| is_leaf_table(*table))
        .filter(|table| has_listing_marker(*table, marker))
        .collect()
}

/// True when no `table` element appears anywhere below this one.
pub fn is_leaf_table(table: ElementRef<'_>) -> bool {
    !table
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .any(|e| e.value().name() == "table")
}

/// True when the table's markup contains the live-listing marker.
pub fn has_listing_marker(table: ElementRef<'_>, marker: &str) -> bool {
    memchr::memmem::find(table.inner_html().as_bytes(), marker.as_bytes()).is_some()
}

/// Rows of a selected table, in document order.
///
/// The parser wraps rows in an implicit `tbody` (and the source markup
/// sometimes adds its own layer), so rows are collected from all descendants
/// rather than direct children. Leaf tables hold no foreign rows.
pub fn table_rows<'a>(table: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    table
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name() == "tr")
}
