//! Line-item transaction model.
//!
//! One `Transaction` is one invoice line, matching the columns of the
//! `transactions` table. `total_price` is written by the producer as
//! quantity * unit_price and treated as authoritative on read.

use crate::types::CustomerId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub invoice_no:   String,
    pub stock_code:   String,
    pub description:  Option<String>,
    pub quantity:     i64,
    pub invoice_date: NaiveDate,
    pub unit_price:   f64,
    pub customer_id:  CustomerId,
    pub country:      String,
    pub total_price:  f64,
}

impl Transaction {
    /// Build a line with the derived total and defaulted country.
    pub fn new_line(
        invoice_no: &str,
        stock_code: &str,
        description: Option<&str>,
        quantity: i64,
        invoice_date: NaiveDate,
        unit_price: f64,
        customer_id: CustomerId,
        country: Option<&str>,
    ) -> Self {
        Self {
            invoice_no:  invoice_no.to_string(),
            stock_code:  stock_code.to_string(),
            description: description.map(str::to_string),
            quantity,
            invoice_date,
            unit_price,
            customer_id,
            country:     country.unwrap_or("Unknown").to_string(),
            total_price: unit_price * quantity as f64,
        }
    }
}

/// A (unit_price, quantity) pair from a submission form.
/// Feeds the cold-start RFM estimate for a brand-new customer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LineItem {
    pub unit_price: f64,
    pub quantity:   i64,
}

impl LineItem {
    pub fn amount(&self) -> f64 {
        self.unit_price * self.quantity as f64
    }
}
