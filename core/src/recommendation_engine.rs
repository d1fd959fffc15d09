//! Content-based item recommendations.
//!
//! Builds a TF-IDF index over normalised item descriptions and answers
//! "most similar items" queries with cosine similarity. The index is
//! frozen after fit(); there is no online vocabulary update — refit
//! over the full catalog to pick up new items.

use crate::{
    error::{InsightError, InsightResult},
    store::CatalogRow,
    text,
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

// ── Public types ─────────────────────────────────────────────────────────────

/// One ranked similar item. Ephemeral, computed per request.
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub stock_code:  String,
    pub description: String,
    pub unit_price:  f64,
    pub score:       f64,
}

// ── Engine ───────────────────────────────────────────────────────────────────

struct IndexedItem {
    stock_code:  String,
    description: String,
    unit_price:  f64,
    /// Sparse l2-normalised tf-idf row: (vocabulary index, weight).
    vector: Vec<(usize, f64)>,
}

pub struct RecommendationEngine {
    max_features: usize,
    items:        Vec<IndexedItem>,
    index_by_code: HashMap<String, usize>,
    fitted:       bool,
}

impl RecommendationEngine {
    pub fn new(max_features: usize) -> Self {
        Self {
            max_features,
            items: Vec::new(),
            index_by_code: HashMap::new(),
            fitted: false,
        }
    }

    /// Fit the TF-IDF index over the catalog.
    ///
    /// Deduplicates by stock code (first occurrence wins) and drops
    /// items whose normalised description is empty. The vocabulary is
    /// capped at `max_features` terms by total corpus frequency, ties
    /// broken alphabetically so a refit over the same catalog builds
    /// the identical index.
    pub fn fit(&mut self, catalog: &[CatalogRow]) -> InsightResult<()> {
        log::info!("fitting recommendation engine on {} catalog rows", catalog.len());
        let stop_words = text::english_stop_words();

        // Dedupe, normalise, tokenise.
        let mut seen: HashSet<&str> = HashSet::new();
        let mut kept: Vec<(&CatalogRow, String)> = Vec::new();
        for row in catalog {
            if !seen.insert(row.stock_code.as_str()) {
                continue;
            }
            let normalized = match &row.description {
                Some(d) => text::normalize(d),
                None => continue,
            };
            if normalized.is_empty() {
                continue;
            }
            kept.push((row, normalized));
        }

        let docs: Vec<Vec<&str>> = kept
            .iter()
            .map(|(_, normalized)| text::tokenize(normalized, &stop_words))
            .collect();

        // Corpus-wide term counts and document frequencies.
        let mut total_count: HashMap<&str, u64> = HashMap::new();
        let mut doc_freq: HashMap<&str, u64> = HashMap::new();
        for tokens in &docs {
            for &token in tokens {
                *total_count.entry(token).or_default() += 1;
            }
            let unique: HashSet<&str> = tokens.iter().copied().collect();
            for token in unique {
                *doc_freq.entry(token).or_default() += 1;
            }
        }

        // Vocabulary: top max_features terms by total count.
        let mut terms: Vec<(&str, u64)> = total_count.into_iter().collect();
        terms.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        terms.truncate(self.max_features);
        let vocabulary: HashMap<&str, usize> = terms
            .iter()
            .enumerate()
            .map(|(i, (term, _))| (*term, i))
            .collect();

        // Smoothed idf, sklearn convention: ln((1+n)/(1+df)) + 1.
        let n_docs = docs.len() as f64;
        let mut idf = vec![0.0f64; vocabulary.len()];
        for (term, &index) in &vocabulary {
            let df = doc_freq.get(term).copied().unwrap_or(0) as f64;
            idf[index] = ((1.0 + n_docs) / (1.0 + df)).ln() + 1.0;
        }

        // Per-item sparse tf-idf rows, l2-normalised so cosine
        // similarity reduces to a sparse dot product.
        self.items.clear();
        self.index_by_code.clear();
        for ((row, _), tokens) in kept.iter().zip(&docs) {
            let mut tf: HashMap<usize, f64> = HashMap::new();
            for &token in tokens {
                if let Some(&index) = vocabulary.get(token) {
                    *tf.entry(index).or_default() += 1.0;
                }
            }
            let mut vector: Vec<(usize, f64)> = tf
                .into_iter()
                .map(|(index, count)| (index, count * idf[index]))
                .collect();
            vector.sort_by_key(|(index, _)| *index);
            let norm = vector.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
            if norm > 0.0 {
                for (_, w) in &mut vector {
                    *w /= norm;
                }
            }

            self.index_by_code
                .insert(row.stock_code.clone(), self.items.len());
            self.items.push(IndexedItem {
                stock_code:  row.stock_code.clone(),
                description: row.description.clone().unwrap_or_default(),
                unit_price:  row.unit_price,
                vector,
            });
        }

        self.fitted = true;
        log::info!("fit complete: {} indexed items", self.items.len());
        Ok(())
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    pub fn catalog_len(&self) -> usize {
        self.items.len()
    }

    /// Top-n items most similar to the query set.
    ///
    /// Similarity against each catalog item is the mean cosine across
    /// all resolved query items — a multi-item query gets one
    /// centroid-like aggregate ranking, not a per-item union. Query
    /// codes are excluded from the output; unknown codes are skipped.
    /// An empty query, or a query where nothing resolves, returns an
    /// empty result.
    pub fn recommend(
        &self,
        stock_codes: &[String],
        top_n: usize,
    ) -> InsightResult<Vec<Recommendation>> {
        if !self.fitted {
            return Err(InsightError::NotFitted);
        }
        if stock_codes.is_empty() {
            return Ok(Vec::new());
        }

        let mut query_indices = Vec::new();
        for code in stock_codes {
            match self.index_by_code.get(code) {
                Some(&index) => query_indices.push(index),
                None => log::warn!("stock code {code} not in catalog, skipping"),
            }
        }
        if query_indices.is_empty() {
            return Ok(Vec::new());
        }

        let excluded: HashSet<&str> = stock_codes.iter().map(String::as_str).collect();

        // Mean cosine per catalog item across the query set.
        let mut scores = vec![0.0f64; self.items.len()];
        for &qi in &query_indices {
            let query = &self.items[qi].vector;
            for (j, item) in self.items.iter().enumerate() {
                scores[j] += sparse_dot(query, &item.vector);
            }
        }
        let divisor = query_indices.len() as f64;

        let mut ranked: Vec<(usize, f64)> = scores
            .iter()
            .enumerate()
            .filter(|(j, _)| !excluded.contains(self.items[*j].stock_code.as_str()))
            .map(|(j, s)| (j, s / divisor))
            .collect();
        // Stable sort: ties keep catalog order.
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(top_n);

        Ok(ranked
            .into_iter()
            .map(|(j, score)| {
                let item = &self.items[j];
                Recommendation {
                    stock_code:  item.stock_code.clone(),
                    description: item.description.clone(),
                    unit_price:  item.unit_price,
                    score,
                }
            })
            .collect())
    }
}

fn sparse_dot(a: &[(usize, f64)], b: &[(usize, f64)]) -> f64 {
    let mut sum = 0.0;
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                sum += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    sum
}
