use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InsightError {
    #[error("Persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Required column '{column}' missing from transactions table")]
    Schema { column: String },

    #[error("Clustering needs at least {required} distinct customers, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("Recommendation engine queried before fit()")]
    NotFitted,

    #[error("Invoice date {invoice_date} is after reference date {reference_date}")]
    InvalidDate {
        invoice_date: NaiveDate,
        reference_date: NaiveDate,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type InsightResult<T> = Result<T, InsightError>;
