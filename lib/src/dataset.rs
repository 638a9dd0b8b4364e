//! Building a [`Dataset`] from CSV rows.
//!
//! A row's key is the hash of its first and fourth columns concatenated; the
//! remaining columns, in order, form the record. Rows sharing a key are all
//! kept under that key.

use crate::dht_messages::{Dataset, Record};
use crate::{hash, Identifier};

/// Column positions that make up a record key.
pub const KEY_COLUMNS: [usize; 2] = [0, 3];

/// Key for a row given its first and fourth column values.
pub fn record_key(first: &str, fourth: &str) -> Identifier {
    hash(&format!("{}{}", first, fourth))
}

/// Splits one CSV line into fields. Double-quoted fields may contain commas,
/// and `""` inside quotes is a literal quote.
pub fn parse_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}

/// Separates a row into its key and record. Rows without a fourth column
/// have no key and yield `None`.
pub fn split_row(fields: &[String]) -> Option<(Identifier, Record)> {
    let first = fields.first()?;
    let fourth = fields.get(3)?;
    let record = fields
        .iter()
        .enumerate()
        .filter(|(i, _)| !KEY_COLUMNS.contains(i))
        .map(|(_, value)| value.clone())
        .collect();
    Some((record_key(first, fourth), record))
}

#[derive(Debug, Default)]
pub struct DatasetBuilder {
    dataset: Dataset,
    rows: usize,
    skipped: usize,
}

impl DatasetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses CSV text, skipping the header line and blank lines.
    pub fn from_csv(text: &str) -> Self {
        let mut builder = Self::new();
        for line in text.lines().skip(1) {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            builder.add_row(&parse_line(line));
        }
        builder
    }

    /// Files the row under its key. Returns false if the row was skipped.
    pub fn add_row(&mut self, fields: &[String]) -> bool {
        match split_row(fields) {
            Some((key, record)) => {
                self.dataset.entry(key).or_default().push(record);
                self.rows += 1;
                true
            }
            None => {
                self.skipped += 1;
                false
            }
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn keys(&self) -> usize {
        self.dataset.len()
    }

    pub fn finish(self) -> Dataset {
        self.dataset
    }
}
