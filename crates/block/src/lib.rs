//! Columnar input blocks for a native block-protocol OLAP database.
//!
//! A user-declared row shape is resolved once into a column schema plus one
//! appender per field; a [`Batch`] then turns pushed rows into a columnar
//! [`Input`] block with no per-row allocation on the append path.
//!
//! ```text
//! [Row values] --append--> [Batch] --query_body/input--> [wire client]
//! ```
//!
//! # Declaring a row shape
//!
//! ```
//! use chfan_block::{Batch, Row, RowShape};
//!
//! struct Visit {
//!     url: String,
//!     status: u16,
//!     cached: bool,
//! }
//!
//! impl Row for Visit {
//!     fn shape() -> RowShape<Self> {
//!         RowShape::builder()
//!             .column("Url", |v: &Visit| &v.url)
//!             .named("Status", "http_status", |v: &Visit| &v.status)
//!             .column("Cached", |v: &Visit| &v.cached)
//!             .build()
//!     }
//! }
//!
//! let mut batch = Batch::<Visit>::new().unwrap();
//! batch.append(&Visit { url: "/".into(), status: 200, cached: false });
//! assert_eq!(batch.rows(), 1);
//! assert_eq!(
//!     batch.query_body("visits"),
//!     "INSERT INTO visits (url,http_status,cached) VALUES",
//! );
//! ```

mod batch;
mod column;
mod error;
mod name;
mod row;

/// Wire value types (dates, decimals, wide integers, intervals).
pub mod types;

pub use batch::Batch;
pub use column::{ColStr, ColumnData, Input, InputColumn};
pub use error::SchemaError;
pub use name::to_snake_case;
pub use row::{ColumnValue, Row, RowShape, ShapeBuilder};
