use chrono::NaiveDate;
use insights_core::{
    config::InsightConfig,
    rfm_engine::RfmEngine,
    transaction::Transaction,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn date(s: &str) -> NaiveDate {
    s.parse().expect("valid test date")
}

fn line(customer_id: i64, invoice_no: &str, day: &str, unit_price: f64) -> Transaction {
    Transaction::new_line(
        invoice_no,
        "21730",
        Some("GLASS STAR FROSTED T-LIGHT HOLDER"),
        1,
        date(day),
        unit_price,
        customer_id,
        None,
    )
}

fn engine() -> RfmEngine {
    RfmEngine::new(InsightConfig::default())
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// One RFM record per distinct customer, with Frequency equal to that
/// customer's line-item count (not distinct invoice numbers).
#[test]
fn one_record_per_customer_frequency_counts_line_items() {
    let transactions = vec![
        line(1, "A", "2024-01-01", 10.0),
        line(1, "A", "2024-01-01", 5.0),
        line(1, "B", "2024-01-10", 20.0),
        line(2, "C", "2024-01-05", 7.5),
    ];

    let records = engine().aggregate(&transactions, None).unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].customer_id, 1);
    assert_eq!(records[0].frequency, 3);
    assert_eq!(records[1].customer_id, 2);
    assert_eq!(records[1].frequency, 1);
}

/// The worked example: two invoices on 2024-01-01 and 2024-01-10 with
/// totals 10 and 20, reference date 2024-01-10, gives R=0 F=2 M=30.
#[test]
fn worked_example_recency_frequency_monetary() {
    let transactions = vec![
        line(1, "A", "2024-01-01", 10.0),
        line(1, "B", "2024-01-10", 20.0),
    ];
    let mut engine =
        RfmEngine::with_reference_date(InsightConfig::default(), date("2024-01-10"));

    let records = engine.aggregate(&transactions, None).unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].recency, 0);
    assert_eq!(records[0].frequency, 2);
    assert!((records[0].monetary - 30.0).abs() < 1e-9);
    // log1p features ride along for clustering.
    assert!((records[0].log_monetary - 30.0f64.ln_1p()).abs() < 1e-9);
    assert!((records[0].log_frequency - 2.0f64.ln_1p()).abs() < 1e-9);
}

/// Recency is never negative when all invoice dates are at or before
/// the reference date.
#[test]
fn recency_non_negative_for_past_dates() {
    let transactions = vec![
        line(1, "A", "2024-01-01", 10.0),
        line(2, "B", "2024-02-15", 10.0),
        line(3, "C", "2024-03-01", 10.0),
    ];

    let records = engine().aggregate(&transactions, None).unwrap();

    for record in &records {
        assert!(record.recency >= 0, "recency {} for customer {}", record.recency, record.customer_id);
    }
}

/// A customer filter restricts aggregation to that customer's rows.
#[test]
fn customer_filter_restricts_output() {
    let transactions = vec![
        line(1, "A", "2024-01-01", 10.0),
        line(2, "B", "2024-01-05", 7.5),
        line(2, "C", "2024-01-08", 2.5),
    ];

    let records = engine().aggregate(&transactions, Some(2)).unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].customer_id, 2);
    assert_eq!(records[0].frequency, 2);
    assert!((records[0].monetary - 10.0).abs() < 1e-9);
}

/// Filtering to a customer with no transactions yields an empty result,
/// not an error.
#[test]
fn unknown_customer_filter_is_empty_not_error() {
    let transactions = vec![line(1, "A", "2024-01-01", 10.0)];

    let records = engine().aggregate(&transactions, Some(99)).unwrap();

    assert!(records.is_empty());
}

/// The filter must not shift the reference date: it is derived from the
/// full batch before filtering, so a quiet customer's recency is
/// measured against the population's latest invoice.
#[test]
fn reference_date_derived_before_customer_filter() {
    let transactions = vec![
        line(1, "A", "2024-01-01", 10.0),
        line(2, "B", "2024-03-01", 10.0),
    ];

    let records = engine().aggregate(&transactions, Some(1)).unwrap();

    // 2024-01-01 .. 2024-03-01 is 60 days.
    assert_eq!(records[0].recency, 60);
}

/// The first aggregate() call fixes the reference date; later calls
/// with different batches keep using it until an explicit reset.
#[test]
fn reference_date_is_memoized_until_reset() {
    let mut engine = engine();

    let first = vec![line(1, "A", "2024-03-01", 10.0)];
    engine.aggregate(&first, None).unwrap();
    assert_eq!(engine.reference_date(), Some(date("2024-03-01")));

    let second = vec![line(2, "B", "2024-02-01", 10.0)];
    let records = engine.aggregate(&second, None).unwrap();
    // Still measured against 2024-03-01.
    assert_eq!(records[0].recency, 29);

    engine.reset_reference_date();
    let records = engine.aggregate(&second, None).unwrap();
    assert_eq!(records[0].recency, 0);
}

/// An empty batch aggregates to an empty result.
#[test]
fn empty_batch_is_empty_result() {
    let records = engine().aggregate(&[], None).unwrap();
    assert!(records.is_empty());
}
