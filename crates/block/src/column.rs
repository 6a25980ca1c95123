//! Typed appendable column buffers and the input block they form.
//!
//! Every buffer keeps its rows in the layout the wire protocol sends them
//! in; `reset` clears the rows but keeps the allocation so pooled batches
//! reuse their storage.

use std::net::{Ipv4Addr, Ipv6Addr};

use uuid::Uuid;

use crate::types::{
    Date, Date32, DateTime, DateTime64, Decimal32, Decimal64, Decimal128, Decimal256, Int256,
    Interval, Nothing, Point, Precision, UInt256,
};

/// String column storage: one contiguous byte buffer plus per-row end
/// offsets, so appending never allocates per row once the buffer has grown.
#[derive(Debug, Default, Clone)]
pub struct ColStr {
    data: Vec<u8>,
    bounds: Vec<usize>,
}

impl ColStr {
    pub fn push(&mut self, value: &str) {
        self.data.extend_from_slice(value.as_bytes());
        self.bounds.push(self.data.len());
    }

    pub fn rows(&self) -> usize {
        self.bounds.len()
    }

    pub fn get(&self, row: usize) -> Option<&str> {
        let end = *self.bounds.get(row)?;
        let start = if row == 0 { 0 } else { self.bounds[row - 1] };
        std::str::from_utf8(&self.data[start..end]).ok()
    }

    pub fn reset(&mut self) {
        self.data.clear();
        self.bounds.clear();
    }
}

/// One typed column buffer.
#[derive(Debug, Clone)]
pub enum ColumnData {
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    UInt128(Vec<u128>),
    UInt256(Vec<UInt256>),
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Int128(Vec<i128>),
    Int256(Vec<Int256>),
    Bool(Vec<bool>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    String(ColStr),
    Decimal32(Vec<Decimal32>),
    Decimal64(Vec<Decimal64>),
    Decimal128(Vec<Decimal128>),
    Decimal256(Vec<Decimal256>),
    Interval(Vec<Interval>),
    Ipv4(Vec<Ipv4Addr>),
    Ipv6(Vec<Ipv6Addr>),
    Nothing(usize),
    Point(Vec<Point>),
    Date(Vec<Date>),
    Date32(Vec<Date32>),
    DateTime(Vec<DateTime>),
    DateTime64 {
        precision: Precision,
        values: Vec<DateTime64>,
    },
    Uuid(Vec<Uuid>),
}

impl ColumnData {
    /// Number of rows currently buffered.
    pub fn rows(&self) -> usize {
        match self {
            ColumnData::UInt8(values) => values.len(),
            ColumnData::UInt16(values) => values.len(),
            ColumnData::UInt32(values) => values.len(),
            ColumnData::UInt64(values) => values.len(),
            ColumnData::UInt128(values) => values.len(),
            ColumnData::UInt256(values) => values.len(),
            ColumnData::Int8(values) => values.len(),
            ColumnData::Int16(values) => values.len(),
            ColumnData::Int32(values) => values.len(),
            ColumnData::Int64(values) => values.len(),
            ColumnData::Int128(values) => values.len(),
            ColumnData::Int256(values) => values.len(),
            ColumnData::Bool(values) => values.len(),
            ColumnData::Float32(values) => values.len(),
            ColumnData::Float64(values) => values.len(),
            ColumnData::String(values) => values.rows(),
            ColumnData::Decimal32(values) => values.len(),
            ColumnData::Decimal64(values) => values.len(),
            ColumnData::Decimal128(values) => values.len(),
            ColumnData::Decimal256(values) => values.len(),
            ColumnData::Interval(values) => values.len(),
            ColumnData::Ipv4(values) => values.len(),
            ColumnData::Ipv6(values) => values.len(),
            ColumnData::Nothing(rows) => *rows,
            ColumnData::Point(values) => values.len(),
            ColumnData::Date(values) => values.len(),
            ColumnData::Date32(values) => values.len(),
            ColumnData::DateTime(values) => values.len(),
            ColumnData::DateTime64 { values, .. } => values.len(),
            ColumnData::Uuid(values) => values.len(),
        }
    }

    /// Clears the rows but keeps the allocation.
    pub fn reset(&mut self) {
        match self {
            ColumnData::UInt8(values) => values.clear(),
            ColumnData::UInt16(values) => values.clear(),
            ColumnData::UInt32(values) => values.clear(),
            ColumnData::UInt64(values) => values.clear(),
            ColumnData::UInt128(values) => values.clear(),
            ColumnData::UInt256(values) => values.clear(),
            ColumnData::Int8(values) => values.clear(),
            ColumnData::Int16(values) => values.clear(),
            ColumnData::Int32(values) => values.clear(),
            ColumnData::Int64(values) => values.clear(),
            ColumnData::Int128(values) => values.clear(),
            ColumnData::Int256(values) => values.clear(),
            ColumnData::Bool(values) => values.clear(),
            ColumnData::Float32(values) => values.clear(),
            ColumnData::Float64(values) => values.clear(),
            ColumnData::String(values) => values.reset(),
            ColumnData::Decimal32(values) => values.clear(),
            ColumnData::Decimal64(values) => values.clear(),
            ColumnData::Decimal128(values) => values.clear(),
            ColumnData::Decimal256(values) => values.clear(),
            ColumnData::Interval(values) => values.clear(),
            ColumnData::Ipv4(values) => values.clear(),
            ColumnData::Ipv6(values) => values.clear(),
            ColumnData::Nothing(rows) => *rows = 0,
            ColumnData::Point(values) => values.clear(),
            ColumnData::Date(values) => values.clear(),
            ColumnData::Date32(values) => values.clear(),
            ColumnData::DateTime(values) => values.clear(),
            ColumnData::DateTime64 { values, .. } => values.clear(),
            ColumnData::Uuid(values) => values.clear(),
        }
    }

    /// Wire type of the column, e.g. `"UInt64"` or `"DateTime64(9)"`.
    pub fn type_name(&self) -> String {
        match self {
            ColumnData::UInt8(_) => "UInt8".into(),
            ColumnData::UInt16(_) => "UInt16".into(),
            ColumnData::UInt32(_) => "UInt32".into(),
            ColumnData::UInt64(_) => "UInt64".into(),
            ColumnData::UInt128(_) => "UInt128".into(),
            ColumnData::UInt256(_) => "UInt256".into(),
            ColumnData::Int8(_) => "Int8".into(),
            ColumnData::Int16(_) => "Int16".into(),
            ColumnData::Int32(_) => "Int32".into(),
            ColumnData::Int64(_) => "Int64".into(),
            ColumnData::Int128(_) => "Int128".into(),
            ColumnData::Int256(_) => "Int256".into(),
            ColumnData::Bool(_) => "Bool".into(),
            ColumnData::Float32(_) => "Float32".into(),
            ColumnData::Float64(_) => "Float64".into(),
            ColumnData::String(_) => "String".into(),
            ColumnData::Decimal32(_) => "Decimal32".into(),
            ColumnData::Decimal64(_) => "Decimal64".into(),
            ColumnData::Decimal128(_) => "Decimal128".into(),
            ColumnData::Decimal256(_) => "Decimal256".into(),
            ColumnData::Interval(_) => "Interval".into(),
            ColumnData::Ipv4(_) => "IPv4".into(),
            ColumnData::Ipv6(_) => "IPv6".into(),
            ColumnData::Nothing(_) => "Nothing".into(),
            ColumnData::Point(_) => "Point".into(),
            ColumnData::Date(_) => "Date".into(),
            ColumnData::Date32(_) => "Date32".into(),
            ColumnData::DateTime(_) => "DateTime".into(),
            ColumnData::DateTime64 { precision, .. } => format!("DateTime64({precision})"),
            ColumnData::Uuid(_) => "UUID".into(),
        }
    }
}

/// A named column buffer inside an input block.
#[derive(Debug, Clone)]
pub struct InputColumn {
    pub name: String,
    pub data: ColumnData,
}

/// The column schema of one insert: named buffers in declaration order.
#[derive(Debug, Default, Clone)]
pub struct Input {
    columns: Vec<InputColumn>,
}

impl Input {
    pub(crate) fn push_column(&mut self, column: InputColumn) {
        self.columns.push(column);
    }

    pub fn columns(&self) -> &[InputColumn] {
        &self.columns
    }

    pub(crate) fn columns_mut(&mut self) -> &mut [InputColumn] {
        &mut self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Rows in the block. Every column holds the same number of rows.
    pub fn rows(&self) -> usize {
        self.columns.first().map_or(0, |column| column.data.rows())
    }

    pub fn reset(&mut self) {
        for column in &mut self.columns {
            column.data.reset();
        }
    }

    /// Renders the insert statement head for this block's columns.
    pub fn query_body(&self, table: &str) -> String {
        let names: Vec<&str> = self
            .columns
            .iter()
            .map(|column| column.name.as_str())
            .collect();
        format!("INSERT INTO {table} ({}) VALUES", names.join(","))
    }
}

#[cfg(test)]
#[path = "column_test.rs"]
mod column_test;
