//! Shared primitive types used across the crate.

/// A customer identifier as stored in the transactions table.
pub type CustomerId = i64;

/// A stock code identifying one catalog item.
pub type StockCode = String;
