//! Row shape declaration.
//!
//! A [`Row`] implementation lists its fields once, in declaration order;
//! from that list the batch factory derives the column schema and one
//! appender per field. Field accessors are plain fn pointers, so shape
//! construction is type-directed: a field type without a matching column
//! fails to compile instead of failing at runtime.

use std::net::{Ipv4Addr, Ipv6Addr};

use chrono::Utc;
use uuid::Uuid;

use crate::column::{ColStr, ColumnData};
use crate::name::to_snake_case;
use crate::types::{
    Date, Date32, DateTime, DateTime64, Decimal32, Decimal64, Decimal128, Decimal256, Int256,
    Interval, Nothing, Point, Precision, UInt256,
};

/// A record whose fields map to the columns of one insert block.
pub trait Row: Sized + Send + 'static {
    /// Field layout, in declaration order. Resolved once per batch factory
    /// run, never on the append path.
    fn shape() -> RowShape<Self>;
}

/// A value type with a matching column buffer.
pub trait ColumnValue: 'static {
    /// Creates the empty column buffer this type appends into.
    fn new_column() -> ColumnData;

    /// Pushes one value into a buffer created by [`ColumnValue::new_column`].
    fn append_to(&self, column: &mut ColumnData);
}

enum FieldName {
    /// Column name derived from the field name via snake_case conversion.
    Auto(&'static str),
    /// Explicit column name, used verbatim.
    Named(&'static str),
}

pub(crate) struct FieldSpec<R> {
    name: FieldName,
    pub(crate) new_column: fn() -> ColumnData,
    pub(crate) append: Box<dyn Fn(&R, &mut ColumnData) + Send + Sync>,
}

impl<R: 'static> FieldSpec<R> {
    pub(crate) fn column_name(&self) -> String {
        match self.name {
            FieldName::Auto(field) => to_snake_case(field),
            FieldName::Named(column) => column.to_owned(),
        }
    }
}

/// The resolved field list of a [`Row`] type.
pub struct RowShape<R> {
    pub(crate) fields: Vec<FieldSpec<R>>,
}

impl<R: 'static> RowShape<R> {
    pub fn builder() -> ShapeBuilder<R> {
        ShapeBuilder { fields: Vec::new() }
    }
}

/// Builds a [`RowShape`] field by field, in declaration order.
pub struct ShapeBuilder<R> {
    fields: Vec<FieldSpec<R>>,
}

impl<R: 'static> ShapeBuilder<R> {
    /// Declares a field whose column name is the snake_case form of `field`.
    pub fn column<T: ColumnValue>(mut self, field: &'static str, get: fn(&R) -> &T) -> Self {
        self.fields.push(bind(FieldName::Auto(field), get));
        self
    }

    /// Declares a field with an explicit column name, used verbatim.
    pub fn named<T: ColumnValue>(
        mut self,
        _field: &'static str,
        column: &'static str,
        get: fn(&R) -> &T,
    ) -> Self {
        self.fields.push(bind(FieldName::Named(column), get));
        self
    }

    /// Declares a field that is excluded from the block.
    pub fn skip(self, _field: &'static str) -> Self {
        self
    }

    pub fn build(self) -> RowShape<R> {
        RowShape {
            fields: self.fields,
        }
    }
}

fn bind<R: 'static, T: ColumnValue>(name: FieldName, get: fn(&R) -> &T) -> FieldSpec<R> {
    FieldSpec {
        name,
        new_column: T::new_column,
        append: Box::new(move |row, column| get(row).append_to(column)),
    }
}

macro_rules! impl_column_value {
    ($($ty:ty => $variant:ident,)*) => {
        $(
            impl ColumnValue for $ty {
                fn new_column() -> ColumnData {
                    ColumnData::$variant(Vec::new())
                }

                fn append_to(&self, column: &mut ColumnData) {
                    match column {
                        ColumnData::$variant(values) => values.push(*self),
                        other => unreachable!(
                            "{} value appended to {} column",
                            stringify!($ty),
                            other.type_name(),
                        ),
                    }
                }
            }
        )*
    };
}

impl_column_value! {
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    u128 => UInt128,
    UInt256 => UInt256,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    i128 => Int128,
    Int256 => Int256,
    bool => Bool,
    f32 => Float32,
    f64 => Float64,
    Decimal32 => Decimal32,
    Decimal64 => Decimal64,
    Decimal128 => Decimal128,
    Decimal256 => Decimal256,
    Interval => Interval,
    Ipv4Addr => Ipv4,
    Ipv6Addr => Ipv6,
    Point => Point,
    Date => Date,
    Date32 => Date32,
    DateTime => DateTime,
    Uuid => Uuid,
}

impl ColumnValue for String {
    fn new_column() -> ColumnData {
        ColumnData::String(ColStr::default())
    }

    fn append_to(&self, column: &mut ColumnData) {
        match column {
            ColumnData::String(values) => values.push(self),
            other => unreachable!("string value appended to {} column", other.type_name()),
        }
    }
}

// Platform-word integers land in the 32- or 64-bit column matching the
// target's pointer width, cast at append.
impl ColumnValue for usize {
    fn new_column() -> ColumnData {
        if cfg!(target_pointer_width = "32") {
            ColumnData::UInt32(Vec::new())
        } else {
            ColumnData::UInt64(Vec::new())
        }
    }

    fn append_to(&self, column: &mut ColumnData) {
        match column {
            ColumnData::UInt32(values) => values.push(*self as u32),
            ColumnData::UInt64(values) => values.push(*self as u64),
            other => unreachable!("usize value appended to {} column", other.type_name()),
        }
    }
}

impl ColumnValue for isize {
    fn new_column() -> ColumnData {
        if cfg!(target_pointer_width = "32") {
            ColumnData::Int32(Vec::new())
        } else {
            ColumnData::Int64(Vec::new())
        }
    }

    fn append_to(&self, column: &mut ColumnData) {
        match column {
            ColumnData::Int32(values) => values.push(*self as i32),
            ColumnData::Int64(values) => values.push(*self as i64),
            other => unreachable!("isize value appended to {} column", other.type_name()),
        }
    }
}

impl ColumnValue for Nothing {
    fn new_column() -> ColumnData {
        ColumnData::Nothing(0)
    }

    fn append_to(&self, column: &mut ColumnData) {
        match column {
            ColumnData::Nothing(rows) => *rows += 1,
            other => unreachable!("nothing value appended to {} column", other.type_name()),
        }
    }
}

// Datetime64 columns always open at maximum precision; the stored ticks are
// interpreted against the column's precision.
impl ColumnValue for DateTime64 {
    fn new_column() -> ColumnData {
        ColumnData::DateTime64 {
            precision: Precision::MAX,
            values: Vec::new(),
        }
    }

    fn append_to(&self, column: &mut ColumnData) {
        match column {
            ColumnData::DateTime64 { values, .. } => values.push(*self),
            other => unreachable!("datetime64 value appended to {} column", other.type_name()),
        }
    }
}

// Wall-clock fields default to the second-precision datetime column.
impl ColumnValue for chrono::DateTime<Utc> {
    fn new_column() -> ColumnData {
        ColumnData::DateTime(Vec::new())
    }

    fn append_to(&self, column: &mut ColumnData) {
        match column {
            ColumnData::DateTime(values) => values.push(DateTime::from_time(*self)),
            other => unreachable!("timestamp value appended to {} column", other.type_name()),
        }
    }
}

#[cfg(test)]
#[path = "row_test.rs"]
mod row_test;
