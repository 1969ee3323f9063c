// =============================================================================
// scrape/page_parser.rs — ROW BY ROW THROUGH ONE PAGE
// =============================================================================
//
// Runs synchronously inside a page task. Every row of every selected table
// goes through the record builder with the page's running carry-over. Each
// outcome is pushed onto the shared channels the moment it is known; a bad
// row costs exactly one row.
//
// The parsed document is not Send. This function never awaits, so it can
// live inside a spawned task without holding the document across a yield.
// =============================================================================

use scraper::{ElementRef, Html};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::error::ScrapeError;
use crate::models::Record;
use crate::scrape::record_builder::{build_record, CarryOver, RawCell, RawRow, RowRules};
use crate::scrape::table_selector::{select_listing_tables, table_rows};

/// Per-page tally for the log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageSummary {
    pub rows: usize,
    pub records: usize,
}

/// Where a page's results go.
pub struct PageSinks<'a> {
    pub records: &'a UnboundedSender<Record>,
    pub errors: &'a UnboundedSender<ScrapeError>,
}

impl PageSinks<'_> {
    fn record(&self, url: &str, record: Record) {
        if self.records.send(record).is_err() {
            warn!(url = %url, "record dropped: aggregator is gone");
        }
    }

    fn error(&self, url: &str, error: ScrapeError) {
        if self.errors.send(error).is_err() {
            warn!(url = %url, "error dropped: aggregator is gone");
        }
    }
}

/// Parse one decoded page, streaming records and errors into `sinks`.
pub fn parse_page(
    url: &str,
    body: &str,
    rules: &RowRules,
    marker: &str,
    sinks: &PageSinks<'_>,
) -> PageSummary {
    info!(url = %url, "parsing started");

    if body.trim().is_empty() {
        sinks.error(
            url,
            ScrapeError::DocumentParse {
                url: url.to_string(),
                reason: "document is empty".to_string(),
            },
        );
        return PageSummary::default();
    }

    let document = Html::parse_document(body);
    let mut summary = PageSummary::default();
    let mut carry = CarryOver::default();

    for table in select_listing_tables(&document, marker) {
        for tr in table_rows(table) {
            let row = raw_row(tr);
            let index = summary.rows;
            summary.rows += 1;

            let (result, next) = build_record(&row, carry, rules);
            carry = next;

            match result {
                Ok(record) => {
                    debug!(url = %url, row = index, record = %record, "record parsed");
                    summary.records += 1;
                    sinks.record(url, record);
                }
                Err(source) => {
                    debug!(url = %url, row = index, error = %source, "row rejected");
                    sinks.error(
                        url,
                        ScrapeError::Row {
                            url: url.to_string(),
                            row: index,
                            cells: row.describe(),
                            source,
                        },
                    );
                }
            }
        }
    }

    info!(
        url = %url,
        records = summary.records,
        rows = summary.rows,
        "parsing finished: {} out of {} rows processed",
        summary.records,
        summary.rows
    );

    summary
}

fn raw_row(tr: ElementRef<'_>) -> RawRow {
    RawRow {
        cells: tr.children().filter_map(ElementRef::wrap).map(raw_cell).collect(),
    }
}

fn raw_cell(td: ElementRef<'_>) -> RawCell {
    let link = td
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name() == "a")
        .find_map(|a| a.value().attr("href"))
        .map(String::from);

    RawCell {
        text: td.text().collect(),
        link,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::RowError;
    use tokio::sync::mpsc::unbounded_channel;

    pub(crate) const BASE: &str = "https://www.lyngsat.com/";
    pub(crate) const PATTERN: &str = r"^https?://www\.lyngsat\.com/[^/]+\.html$";

    /// A full five-cell listing row, shaped like the live pages.
    pub(crate) fn full_row(position: &str, link: &str, name_html: &str) -> String {
        format!(
            r#"<tr>
<td bgcolor="white" width=1><font size=2>&nbsp;</font></td><td width=70 rowspan=3 bgcolor=khaki align="center"><font face="Verdana"><font size=2><a href="{BASE}group.html">{position}</font></a></td>
<td width=180 bgcolor=khaki><font face="Arial"><font size=2><a href="{link}">{name_html}</a></td>
<td width=20 bgcolor=khaki><font face="Arial"><font size=1></font><font size=1> Ku</font></td>
<td width=50 bgcolor=#ffffff align=center><font face="Verdana" size=1>120507</td>
</tr>"#
        )
    }

    /// A four-cell rowspan continuation row.
    pub(crate) fn continuation_row(link: &str, name: &str) -> String {
        format!(
            r#"<tr>
<td bgcolor="white" width=1><font size=2>&nbsp;</font></td><td width=180 bgcolor=khaki><font face="Arial"><font size=2><a href="{link}">{name}</a></td>
<td width=20 bgcolor=khaki><font face="Arial"><font size=1></font><font size=1> Ku</font></td>
<td width=50 bgcolor=#ffffff align=center><font face="Verdana" size=1>190520</td>
</tr>"#
        )
    }

    pub(crate) fn table(rows: &[String]) -> String {
        format!("<table cellspacing=0 border>\n{}\n</table>", rows.join("\n"))
    }

    fn run(body: &str) -> (PageSummary, Vec<Record>, Vec<ScrapeError>) {
        let rules = RowRules::new(BASE, PATTERN).unwrap();
        let (record_tx, mut record_rx) = unbounded_channel();
        let (error_tx, mut error_rx) = unbounded_channel();
        let sinks = PageSinks {
            records: &record_tx,
            errors: &error_tx,
        };

        let summary = parse_page("test://page", body, &rules, "Verdana", &sinks);

        let mut records = Vec::new();
        while let Ok(r) = record_rx.try_recv() {
            records.push(r);
        }
        let mut errors = Vec::new();
        while let Ok(e) = error_rx.try_recv() {
            errors.push(e);
        }
        (summary, records, errors)
    }

    fn row_errors(errors: &[ScrapeError]) -> Vec<RowError> {
        errors.iter().filter_map(|e| e.row_error().cloned()).collect()
    }

    #[test]
    fn test_rowspan_rows_share_position() {
        let body = table(&[
            full_row("156.</font><font size=1>0</font><font size=2>&#176;E", &format!("{BASE}Optus-D3.html"), "Optus D3"),
            continuation_row(&format!("{BASE}Optus-10.html"), "Optus 10"),
        ]);
        let (summary, records, errors) = run(&body);

        assert!(errors.is_empty());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].position, 156.0);
        assert_eq!(records[0].position, records[1].position);
        assert_eq!(summary, PageSummary { rows: 2, records: 2 });
    }

    #[test]
    fn test_inclination_note_is_stripped_and_first_link_wins() {
        let name_html = format!(
            r#"ABS 7</a> <i><font face="Arial" size=1><a href="{BASE}tracker/ABS-7.html">(incl. 0.<font size=1>6</font>°)"#
        );
        let body = table(&[full_row("116.0&#176;E", &format!("{BASE}ABS-7.html"), &name_html)]);
        let (_, records, errors) = run(&body);

        assert!(errors.is_empty());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "ABS 7");
        assert_eq!(records[0].url, format!("{BASE}ABS-7.html"));
        assert_eq!(records[0].band, "Ku");
    }

    #[test]
    fn test_inclination_note_on_its_own_line_is_stripped() {
        let name_html = format!(
            "ABS 7</a> <i><font face=\"Arial\" size=1><a href=\"{BASE}tracker/ABS-7.html\">(incl.\n0.6&#176;)</a></i>\n"
        );
        let body = table(&[full_row("116.0&#176;E", "ABS-7.html", &name_html)]);
        let (_, records, errors) = run(&body);

        assert!(errors.is_empty());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "ABS 7");
    }

    #[test]
    fn test_west_position_from_markup() {
        let body = table(&[full_row("116.0&#176;w", "ABS-7.html", "ABS 7")]);
        let (_, records, _) = run(&body);
        assert_eq!(records[0].position, -116.0);
    }

    #[test]
    fn test_continuation_without_position_is_one_error() {
        let body = table(&[continuation_row("ABS-7.html", "ABS 7")]);
        let (summary, records, errors) = run(&body);

        assert!(records.is_empty());
        assert_eq!(row_errors(&errors), vec![RowError::MissingPosition]);
        assert_eq!(summary, PageSummary { rows: 1, records: 0 });
    }

    #[test]
    fn test_bad_row_does_not_stop_siblings() {
        let six_cells = full_row("13.0&#176;E", "Hot-Bird-13F.html", "Hot Bird 13F")
            .replace("</tr>", "<td></td></tr>");
        let body = table(&[
            full_row("13.0&#176;E", "Hot-Bird-13E.html", "Hot Bird 13E"),
            six_cells,
            continuation_row("Hot-Bird-13G.html", "Hot Bird 13G"),
        ]);
        let (_, records, errors) = run(&body);

        assert_eq!(row_errors(&errors), vec![RowError::RowShape(6)]);
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Hot Bird 13E", "Hot Bird 13G"]);
        assert_eq!(records[1].position, 13.0);
    }

    #[test]
    fn test_three_cell_row_is_shape_error() {
        let row = format!(
            r#"<tr><td>&nbsp;</td><td><font face="Verdana">156.0&#176;E</font></td><td><a href="{BASE}Optus-D3.html">Optus D3</a></td></tr>"#
        );
        let (_, records, errors) = run(&table(&[row]));
        assert!(records.is_empty());
        assert_eq!(row_errors(&errors), vec![RowError::RowShape(3)]);
    }

    #[test]
    fn test_missing_link_and_bad_link() {
        let no_link = full_row("116.0&#176;E", "x", "ABS 7").replace(r#"<a href="x">"#, "");
        let tracker = full_row("116.0&#176;E", &format!("{BASE}tracker/ABS-7.html"), "ABS 7");

        let (_, _, errors) = run(&table(&[no_link]));
        assert_eq!(row_errors(&errors), vec![RowError::UrlMissing]);

        let (_, _, errors) = run(&table(&[tracker]));
        assert!(matches!(row_errors(&errors)[..], [RowError::UrlFormat { .. }]));
    }

    #[test]
    fn test_archived_table_yields_nothing() {
        let body = table(&[full_row("156.0&#176;E", "Optus-D3.html", "Optus D3")])
            .replace("Verdana", "Arial");
        let (summary, records, errors) = run(&body);

        assert!(records.is_empty());
        assert!(errors.is_empty());
        assert_eq!(summary.rows, 0);
    }

    #[test]
    fn test_table_with_nested_table_yields_nothing() {
        let body = table(&[
            full_row("156.0&#176;E", "Optus-D3.html", "Optus D3"),
            "<tr><td><table/></td></tr>".to_string(),
        ]);
        let (_, records, errors) = run(&body);

        assert!(records.is_empty());
        assert!(errors.is_empty());
    }

    #[test]
    fn test_empty_body_is_document_error() {
        let (_, records, errors) = run("  \n ");
        assert!(records.is_empty());
        assert!(matches!(errors[..], [ScrapeError::DocumentParse { .. }]));
    }

    #[test]
    fn test_carry_over_does_not_cross_pages() {
        let first = table(&[full_row("156.0&#176;E", "Optus-D3.html", "Optus D3")]);
        let second = table(&[continuation_row("Optus-10.html", "Optus 10")]);

        let (_, records, _) = run(&first);
        assert_eq!(records.len(), 1);

        let (_, records, errors) = run(&second);
        assert!(records.is_empty());
        assert_eq!(row_errors(&errors), vec![RowError::MissingPosition]);
    }
}
