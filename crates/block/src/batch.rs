//! One columnar block of rows staged for a single insert.

use std::collections::HashSet;

use crate::column::{Input, InputColumn};
use crate::error::SchemaError;
use crate::row::Row;

type Appender<R> = Box<dyn Fn(&R, &mut crate::column::ColumnData) + Send + Sync>;

/// Accumulates rows of `R` into a columnar [`Input`] block.
///
/// The column schema and the per-field appenders are resolved once at
/// construction; `append` dispatches each field straight into its column
/// buffer with no allocation.
pub struct Batch<R: Row> {
    input: Input,
    appenders: Vec<Appender<R>>,
}

impl<R: Row> Batch<R> {
    /// Resolves `R`'s shape into a fresh, empty batch.
    pub fn new() -> Result<Self, SchemaError> {
        let shape = R::shape();
        let mut input = Input::default();
        let mut appenders = Vec::with_capacity(shape.fields.len());
        let mut seen = HashSet::new();

        for field in shape.fields {
            let name = field.column_name();
            if !seen.insert(name.clone()) {
                return Err(SchemaError::DuplicateColumn(name));
            }
            input.push_column(InputColumn {
                name,
                data: (field.new_column)(),
            });
            appenders.push(field.append);
        }

        if appenders.is_empty() {
            return Err(SchemaError::EmptyShape);
        }

        Ok(Self { input, appenders })
    }

    /// Appends one row: every field is pushed into its column buffer.
    pub fn append(&mut self, row: &R) {
        for (appender, column) in self.appenders.iter().zip(self.input.columns_mut()) {
            appender(row, &mut column.data);
        }
    }

    /// Rows accumulated so far.
    pub fn rows(&self) -> usize {
        self.input.rows()
    }

    pub fn input(&self) -> &Input {
        &self.input
    }

    /// Renders the insert statement head for this batch's columns.
    pub fn query_body(&self, table: &str) -> String {
        self.input.query_body(table)
    }

    /// Clears all rows, keeping column allocations for reuse.
    pub fn reset(&mut self) {
        self.input.reset();
    }
}

#[cfg(test)]
#[path = "batch_test.rs"]
mod batch_test;
