//! Outer join of key series into a per-device table

use crate::{KeySeries, SampleValue};
use std::collections::BTreeMap;

/// Timestamp-indexed table for one device
///
/// One column per key, in the order the series were added. A row exists for
/// every timestamp at which at least one key has a sample; keys without a
/// sample at that timestamp leave an empty cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceTable {
    columns: Vec<String>,
    rows: BTreeMap<i64, Vec<Option<SampleValue>>>,
}

impl DeviceTable {
    /// Create an empty table without columns
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a key series as a new column
    pub fn add_series(&mut self, series: KeySeries) {
        let column = self.columns.len();
        self.columns.push(series.key);

        for cells in self.rows.values_mut() {
            cells.push(None);
        }

        for sample in series.samples {
            let cells = self
                .rows
                .entry(sample.ts)
                .or_insert_with(|| vec![None; column + 1]);
            cells[column] = Some(sample.value);
        }
    }

    /// Column names in insertion order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when no key contributed a sample
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Timestamp of the most recent row
    pub fn newest_ts(&self) -> Option<i64> {
        self.rows.keys().next_back().copied()
    }

    /// Rows, newest first
    pub fn rows_newest_first(&self) -> impl Iterator<Item = (i64, &[Option<SampleValue>])> {
        self.rows.iter().rev().map(|(ts, cells)| (*ts, cells.as_slice()))
    }

    /// Value of `key` at `ts`, if present
    pub fn value(&self, ts: i64, key: &str) -> Option<&SampleValue> {
        let column = self.columns.iter().position(|c| c == key)?;
        self.rows.get(&ts)?.get(column)?.as_ref()
    }
}

/// Merge key series, in fetch order, into one table
pub fn merge(series: impl IntoIterator<Item = KeySeries>) -> DeviceTable {
    let mut table = DeviceTable::new();
    for s in series {
        table.add_series(s);
    }
    table
}
