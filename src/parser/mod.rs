//! Raw message bytes to [`Part`](crate::model::Part) trees, plus header decoding.

pub mod header;
pub mod mime;
