//! Submission orchestration.
//!
//! `InsightService` is the long-lived object a request handler holds.
//! It owns the store plus two lazily built caches: the fitted
//! recommendation engine and the classified population snapshot.
//! Build-if-absent happens inside the cache's mutex, so two requests
//! racing on the first build serialize instead of fitting twice.
//! `refresh()` drops both caches; the next request rebuilds them from
//! the store.
//!
//! Submission flow: snapshot lookup → persist (all-or-nothing) →
//! dispatch Known/ColdStart → recommend. The snapshot is captured
//! before the persist so a customer's very first submission is judged
//! against the population as it stood, which is what routes them down
//! the cold-start path. A population too small to classify counts as
//! "no profile yet", not a failure: the write still lands and the
//! submission cold-starts, so the store can bootstrap through submit().

use crate::{
    config::InsightConfig,
    error::{InsightError, InsightResult},
    recommendation_engine::{Recommendation, RecommendationEngine},
    rfm_engine::{CustomerProfile, RfmEngine, RfmRecord},
    store::InsightStore,
    transaction::{LineItem, Transaction},
    types::CustomerId,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};

// ── Request / response types ─────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct SubmittedItem {
    pub stock_code:  String,
    pub description: String,
    pub quantity:    i64,
    pub unit_price:  f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTransactionRequest {
    pub invoice_no:   String,
    pub customer_id:  CustomerId,
    pub invoice_date: NaiveDate,
    #[serde(default)]
    pub country:      Option<String>,
    pub items:        Vec<SubmittedItem>,
}

/// The two RFM computation paths, dispatched once per submission.
#[derive(Debug, Clone, Serialize)]
pub enum RfmResult {
    /// Customer existed in the population snapshot: clustered profile.
    Known(CustomerProfile),
    /// No historical footprint: synthetic estimate, labelled "New".
    ColdStart(RfmRecord),
}

impl RfmResult {
    pub fn record(&self) -> &RfmRecord {
        match self {
            Self::Known(profile) => &profile.rfm,
            Self::ColdStart(record) => record,
        }
    }

    pub fn profile_label(&self) -> &'static str {
        match self {
            Self::Known(profile) => profile.profile.as_str(),
            Self::ColdStart(_) => "New",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubmissionOutcome {
    pub rfm:             RfmResult,
    pub recommendations: Vec<Recommendation>,
}

// ── Service ──────────────────────────────────────────────────────────────────

pub struct InsightService {
    store:       InsightStore,
    config:      InsightConfig,
    recommender: Mutex<Option<RecommendationEngine>>,
    profiles:    Mutex<Option<Vec<CustomerProfile>>>,
}

impl InsightService {
    pub fn new(store: InsightStore, config: InsightConfig) -> Self {
        Self {
            store,
            config,
            recommender: Mutex::new(None),
            profiles:    Mutex::new(None),
        }
    }

    pub fn store(&self) -> &InsightStore {
        &self.store
    }

    /// Drop both cached engines. The next request rebuilds them from
    /// the store, folding in everything persisted since the last build.
    pub fn refresh(&self) {
        *lock_recover(&self.recommender) = None;
        *lock_recover(&self.profiles) = None;
        log::info!("caches invalidated; engines will rebuild on next use");
    }

    /// Persist a submission and report the customer's profile plus
    /// top-n recommendations for the submitted stock codes.
    pub fn submit(&self, request: &NewTransactionRequest) -> InsightResult<SubmissionOutcome> {
        // Snapshot first: the profile shown is judged against the
        // population as persisted before this submission. Too few
        // customers to classify means no profile yet; the write below
        // must still happen.
        let known = match self.lookup_profile(request.customer_id) {
            Ok(known) => known,
            Err(InsightError::InsufficientData { required, actual }) => {
                log::info!(
                    "population too small to classify ({actual} of {required}); \
                     treating submission as cold start"
                );
                None
            }
            Err(err) => return Err(err),
        };

        let rows: Vec<Transaction> = request
            .items
            .iter()
            .map(|item| {
                Transaction::new_line(
                    &request.invoice_no,
                    &item.stock_code,
                    Some(&item.description),
                    item.quantity,
                    request.invoice_date,
                    item.unit_price,
                    request.customer_id,
                    request.country.as_deref(),
                )
            })
            .collect();
        self.store.append_transactions(&rows)?;

        let rfm = match known {
            Some(profile) => RfmResult::Known(profile),
            None => {
                let line_items: Vec<LineItem> = request
                    .items
                    .iter()
                    .map(|item| LineItem {
                        unit_price: item.unit_price,
                        quantity:   item.quantity,
                    })
                    .collect();
                RfmResult::ColdStart(RfmEngine::estimate_new_customer(
                    request.customer_id,
                    &line_items,
                    request.invoice_date,
                    None,
                )?)
            }
        };

        let codes: Vec<String> = request
            .items
            .iter()
            .map(|item| item.stock_code.clone())
            .collect();
        let recommendations = self.recommend(&codes, self.config.default_top_n)?;

        Ok(SubmissionOutcome {
            rfm,
            recommendations,
        })
    }

    /// Clustered profile for one customer, from the cached snapshot.
    /// None when the customer has no history in the snapshot.
    pub fn lookup_profile(&self, customer_id: CustomerId) -> InsightResult<Option<CustomerProfile>> {
        let mut guard = lock_recover(&self.profiles);
        let profiles = match &mut *guard {
            Some(profiles) => profiles,
            none => none.insert(self.build_profiles()?),
        };
        Ok(profiles
            .iter()
            .find(|p| p.rfm.customer_id == customer_id)
            .cloned())
    }

    /// The full classified population, primarily for dashboards.
    pub fn population_profiles(&self) -> InsightResult<Vec<CustomerProfile>> {
        let mut guard = lock_recover(&self.profiles);
        let profiles = match &mut *guard {
            Some(profiles) => profiles,
            none => none.insert(self.build_profiles()?),
        };
        Ok(profiles.clone())
    }

    /// Top-n similar items from the cached recommendation engine.
    pub fn recommend(&self, codes: &[String], top_n: usize) -> InsightResult<Vec<Recommendation>> {
        let mut guard = lock_recover(&self.recommender);
        let engine = match &mut *guard {
            Some(engine) => engine,
            none => {
                let mut engine = RecommendationEngine::new(self.config.max_features);
                engine.fit(&self.store.catalog_rows()?)?;
                none.insert(engine)
            }
        };
        engine.recommend(codes, top_n)
    }

    fn build_profiles(&self) -> InsightResult<Vec<CustomerProfile>> {
        let load = self.store.load_all_transactions()?;
        let mut engine = RfmEngine::new(self.config.clone());
        let records = engine.aggregate(&load.transactions, None)?;
        engine.classify(&records)
    }
}

/// A poisoned lock only means another thread panicked mid-build; the
/// caches hold Option values that are safe to overwrite, so recover.
fn lock_recover<T>(mutex: &Mutex<Option<T>>) -> std::sync::MutexGuard<'_, Option<T>> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
