//! Feature columns in evaluation order.
//!
//! The engine pushes one column per feature in schema order, so a row read
//! across all columns is already in schema order. Lag features look up
//! their base column by name instead of recomputing it.

use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct ColumnStore {
    index: HashMap<String, usize>,
    columns: Vec<Vec<f64>>,
}

impl ColumnStore {
    pub fn with_capacity(width: usize) -> Self {
        Self {
            index: HashMap::with_capacity(width),
            columns: Vec::with_capacity(width),
        }
    }

    /// Append a column. A repeated name replaces the earlier column in place.
    pub fn push(&mut self, name: String, values: Vec<f64>) {
        match self.index.get(&name) {
            Some(&i) => self.columns[i] = values,
            None => {
                self.index.insert(name, self.columns.len());
                self.columns.push(values);
            }
        }
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.index.get(name).map(|&i| self.columns[i].as_slice())
    }

    /// Number of distinct columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Values at bar `i` across every column, in push order.
    pub fn row(&self, i: usize) -> Vec<f64> {
        self.columns
            .iter()
            .map(|col| col.get(i).copied().unwrap_or(f64::NAN))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_follow_push_order() {
        let mut store = ColumnStore::with_capacity(2);
        store.push("ret_1".into(), vec![f64::NAN, 0.5, 0.25]);
        store.push("sma_5".into(), vec![1.0, 2.0, 3.0]);
        assert_eq!(store.width(), 2);
        assert_eq!(store.row(2), vec![0.25, 3.0]);
        assert!(store.row(0)[0].is_nan());
        assert_eq!(store.column("sma_5"), Some(&[1.0, 2.0, 3.0][..]));
        assert_eq!(store.column("rsi_14"), None);
    }

    #[test]
    fn repeated_name_keeps_position() {
        let mut store = ColumnStore::default();
        store.push("a".into(), vec![1.0]);
        store.push("b".into(), vec![2.0]);
        store.push("a".into(), vec![3.0]);
        assert_eq!(store.width(), 2);
        assert_eq!(store.row(0), vec![3.0, 2.0]);
    }

    #[test]
    fn short_column_reads_as_undefined() {
        let mut store = ColumnStore::default();
        store.push("a".into(), vec![1.0]);
        assert!(store.row(5)[0].is_nan());
    }
}
