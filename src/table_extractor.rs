use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::models::{GroupRecord, RowRecord, ScrapeEntry};
use crate::utils::error::{AppError, Result};

/// Class signature of the fee tables on a course detail panel.
pub const FEE_TABLE_SELECTOR: &str = r#"table[class="jsx-2530098677 table-new table-responsive"]"#;

/// Strips the site's "check/view/see details" link text from cells and
/// collapses whitespace.
#[derive(Debug, Clone)]
pub struct CellCleaner {
    boilerplate: Regex,
}

impl Default for CellCleaner {
    fn default() -> Self {
        Self::new()
    }
}

impl CellCleaner {
    pub fn new() -> Self {
        Self {
            boilerplate: Regex::new(r"(?i)\s*(?:check|view|see)\s+details?\b\s*")
                .expect("boilerplate pattern is valid"),
        }
    }

    pub fn clean(&self, text: &str) -> String {
        let mut current = collapse_whitespace(text);
        // Removing one phrase can join the halves of another one
        while self.boilerplate.is_match(&current) {
            current = collapse_whitespace(&self.boilerplate.replace_all(&current, " "));
        }
        current
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub struct TableExtractor {
    table: Selector,
    row: Selector,
    header_cell: Selector,
    data_cell: Selector,
    cleaner: CellCleaner,
}

impl TableExtractor {
    pub fn new(table_selector: &str) -> Result<Self> {
        Ok(Self {
            table: parse_selector(table_selector)?,
            row: parse_selector("tr")?,
            header_cell: parse_selector("th")?,
            data_cell: parse_selector("td")?,
            cleaner: CellCleaner::new(),
        })
    }

    pub fn fee_tables() -> Result<Self> {
        Self::new(FEE_TABLE_SELECTOR)
    }

    /// Turns every matching table in `html` into a `{label -> rows}` entry.
    /// The first row of a table is its header; rows without `td` cells are
    /// skipped, and short rows simply lack the trailing keys.
    pub fn extract(&self, html: &str, group: &GroupRecord) -> Vec<ScrapeEntry> {
        let document = Html::parse_document(html);

        document
            .select(&self.table)
            .enumerate()
            .map(|(table_index, table)| ScrapeEntry {
                group_index: group.index,
                table_index,
                label: group.label.clone(),
                rows: self.table_rows(table),
            })
            .collect()
    }

    fn table_rows(&self, table: ElementRef<'_>) -> Vec<RowRecord> {
        let mut rows = table.select(&self.row);

        let header: Vec<String> = match rows.next() {
            Some(first) => first
                .select(&self.header_cell)
                .map(|th| element_text(th).trim().to_string())
                .collect(),
            None => return Vec::new(),
        };

        rows.filter_map(|row| {
            let cells: Vec<String> = row
                .select(&self.data_cell)
                .map(|td| self.cleaner.clean(&element_text(td)))
                .collect();
            if cells.is_empty() {
                return None;
            }
            Some(header.iter().cloned().zip(cells).collect::<RowRecord>())
        })
        .collect()
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>()
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| AppError::internal(format!("Invalid CSS selector '{}': {:?}", selector, e)))
}
