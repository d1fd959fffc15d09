//! insights-core — customer segmentation and item recommendations
//! from retail transaction history.
//!
//! Layout:
//!   - `store`                 SQLite persistence (only module that runs SQL)
//!   - `transaction`           line-item transaction model
//!   - `rfm_engine`            RFM aggregation, cold-start estimate, profiling
//!   - `cluster`               seeded k-means used by the RFM engine
//!   - `text`                  description normalisation + stop words
//!   - `recommendation_engine` TF-IDF / cosine item similarity
//!   - `pipeline`              submission orchestration and cached engines

pub mod cluster;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod recommendation_engine;
pub mod rfm_engine;
pub mod store;
pub mod text;
pub mod transaction;
pub mod types;
