//! Schema resolution errors.

/// Errors from resolving a row shape into a column schema.
///
/// Fatal at construction: a batch is never created from an invalid shape.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The shape declares no appendable columns.
    #[error("row shape declares no appendable columns")]
    EmptyShape,

    /// Two fields resolved to the same column name.
    #[error("duplicate column name {0:?}")]
    DuplicateColumn(String),
}
