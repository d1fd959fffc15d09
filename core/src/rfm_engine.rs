//! RFM (Recency / Frequency / Monetary) aggregation and profiling.
//!
//! Two computation paths:
//!   1. Batch: re-aggregate the full history per request, then cluster
//!      customers into behavioural profiles with seeded k-means.
//!   2. Cold start: a synthetic single-customer estimate built from the
//!      submitted line items alone, no history and no clustering.
//!
//! Frequency counts line items, not distinct invoice numbers. That is
//! a deliberate simplification carried over from the original model.

use crate::{
    cluster::KMeans,
    config::InsightConfig,
    error::{InsightError, InsightResult},
    transaction::{LineItem, Transaction},
    types::CustomerId,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Public types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RfmRecord {
    pub customer_id:   CustomerId,
    pub recency:       i64,
    pub frequency:     i64,
    pub monetary:      f64,
    // log1p transforms, kept as auxiliary clustering features and
    // never displayed raw.
    pub log_recency:   f64,
    pub log_frequency: f64,
    pub log_monetary:  f64,
}

impl RfmRecord {
    fn from_raw(customer_id: CustomerId, recency: i64, frequency: i64, monetary: f64) -> Self {
        Self {
            customer_id,
            recency,
            frequency,
            monetary,
            log_recency:   (recency as f64).ln_1p(),
            log_frequency: (frequency as f64).ln_1p(),
            log_monetary:  monetary.ln_1p(),
        }
    }
}

/// Behavioural profile attached after clustering. Ephemeral: it is
/// recomputed on every batch run and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Profile {
    New,
    AtRisk,
    Loyal,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::AtRisk => "At Risk",
            Self::Loyal => "Loyal",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub rfm:     RfmRecord,
    pub cluster: usize,
    pub profile: Profile,
}

// ── Engine ───────────────────────────────────────────────────────────────────

pub struct RfmEngine {
    config: InsightConfig,
    /// Fixed once derived: the first aggregate() call locks the
    /// reference date to that batch's max invoice date. Later calls
    /// keep using it until reset_reference_date().
    reference_date: Option<NaiveDate>,
}

impl RfmEngine {
    pub fn new(config: InsightConfig) -> Self {
        Self {
            config,
            reference_date: None,
        }
    }

    pub fn with_reference_date(config: InsightConfig, reference_date: NaiveDate) -> Self {
        Self {
            config,
            reference_date: Some(reference_date),
        }
    }

    pub fn reference_date(&self) -> Option<NaiveDate> {
        self.reference_date
    }

    /// Clear the memoized reference date so the next aggregate() call
    /// derives it from its own batch.
    pub fn reset_reference_date(&mut self) {
        self.reference_date = None;
    }

    /// Aggregate the batch into one RFM record per distinct customer.
    ///
    /// The reference date, when unset, is derived from the full batch
    /// before the optional customer filter is applied — filtering to a
    /// quiet customer must not shift recency for everyone else.
    /// Returns an empty vector (not an error) when the filter matches
    /// no transactions.
    pub fn aggregate(
        &mut self,
        transactions: &[Transaction],
        customer_id: Option<CustomerId>,
    ) -> InsightResult<Vec<RfmRecord>> {
        if transactions.is_empty() {
            return Ok(Vec::new());
        }

        let reference_date = match self.reference_date {
            Some(date) => date,
            None => {
                let Some(max_date) = transactions.iter().map(|t| t.invoice_date).max() else {
                    return Ok(Vec::new());
                };
                self.reference_date = Some(max_date);
                max_date
            }
        };
        log::info!("using reference date {reference_date}");

        // Per-customer (latest invoice date, line count, monetary sum),
        // in ascending customer-id order for determinism.
        let mut groups: BTreeMap<CustomerId, (NaiveDate, i64, f64)> = BTreeMap::new();
        for t in transactions {
            if customer_id.is_some_and(|id| id != t.customer_id) {
                continue;
            }
            let entry = groups
                .entry(t.customer_id)
                .or_insert((t.invoice_date, 0, 0.0));
            entry.0 = entry.0.max(t.invoice_date);
            entry.1 += 1;
            entry.2 += t.total_price;
        }

        if groups.is_empty() {
            if let Some(id) = customer_id {
                log::warn!("no transactions found for customer {id}");
            }
            return Ok(Vec::new());
        }

        let records: Vec<RfmRecord> = groups
            .into_iter()
            .map(|(id, (last_invoice, frequency, monetary))| {
                let recency = (reference_date - last_invoice).num_days();
                RfmRecord::from_raw(id, recency, frequency, monetary)
            })
            .collect();

        log::info!("RFM metrics calculated for {} customers", records.len());
        Ok(records)
    }

    /// Zero-history estimate for a customer not yet in the batch
    /// snapshot. Pure: no history, no clustering, no engine state.
    ///
    /// Monetary sums across all submitted line items. The reference
    /// date defaults to today; an invoice date past the reference date
    /// is rejected rather than producing a negative recency.
    pub fn estimate_new_customer(
        customer_id: CustomerId,
        line_items: &[LineItem],
        invoice_date: NaiveDate,
        reference_date: Option<NaiveDate>,
    ) -> InsightResult<RfmRecord> {
        let reference_date = reference_date.unwrap_or_else(|| Utc::now().date_naive());
        if invoice_date > reference_date {
            return Err(InsightError::InvalidDate {
                invoice_date,
                reference_date,
            });
        }

        let recency = (reference_date - invoice_date).num_days();
        let monetary: f64 = line_items.iter().map(LineItem::amount).sum();
        Ok(RfmRecord::from_raw(customer_id, recency, 1, monetary))
    }

    /// Cluster the aggregated records and attach profile labels.
    ///
    /// Clustering runs on the raw {Recency, Frequency, Monetary}
    /// features without standardisation, so Monetary's scale dominates
    /// the distance metric. That matches the original model and is
    /// kept as-is; see DESIGN.md.
    ///
    /// Labels are assigned by ranking clusters on centroid Monetary
    /// ascending (lowest spend = New, highest = Loyal) instead of the
    /// original's raw-cluster-id mapping, so the label attached to a
    /// given customer is stable across reruns.
    pub fn classify(&self, records: &[RfmRecord]) -> InsightResult<Vec<CustomerProfile>> {
        let kmeans = KMeans::new(self.config.cluster_count, self.config.cluster_seed)
            .with_max_iter(self.config.kmeans_max_iter)
            .with_tol(self.config.kmeans_tol);

        let points: Vec<Vec<f64>> = records
            .iter()
            .map(|r| vec![r.recency as f64, r.frequency as f64, r.monetary])
            .collect();
        let fit = kmeans.fit(&points)?;

        // Rank clusters by centroid monetary, ascending.
        let mut order: Vec<usize> = (0..fit.centroids.len()).collect();
        order.sort_by(|&a, &b| {
            fit.centroids[a][2]
                .partial_cmp(&fit.centroids[b][2])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let mut rank_of = vec![0usize; fit.centroids.len()];
        for (rank, &cluster) in order.iter().enumerate() {
            rank_of[cluster] = rank;
        }

        let last_rank = fit.centroids.len() - 1;
        let profiles = records
            .iter()
            .zip(&fit.labels)
            .map(|(record, &cluster)| {
                let profile = match rank_of[cluster] {
                    0 => Profile::New,
                    r if r == last_rank => Profile::Loyal,
                    _ => Profile::AtRisk,
                };
                CustomerProfile {
                    rfm: record.clone(),
                    cluster,
                    profile,
                }
            })
            .collect();

        Ok(profiles)
    }
}
