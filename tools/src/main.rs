//! insight-runner: headless submission runner for the retail insights engine.
//!
//! Usage:
//!   insight-runner --db retail.db --seed-demo
//!   insight-runner --db retail.db --invoice INV-1001 --customer 7 \
//!       --date 2024-03-02 --items "21730:GLASS STAR FROSTED T-LIGHT HOLDER:2:4.25"
//!
//! Each --items entry is stock_code:description:quantity:unit_price;
//! pass the flag multiple times for a multi-line invoice.

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use insights_core::{
    config::InsightConfig,
    pipeline::{InsightService, NewTransactionRequest, SubmittedItem},
    store::InsightStore,
    transaction::Transaction,
};
use std::env;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = arg_value(&args, "--db").unwrap_or(":memory:");
    let config = match arg_value(&args, "--config") {
        Some(path) => InsightConfig::load(path)?,
        None => InsightConfig::default(),
    };

    println!("retail insights — insight-runner");
    println!("  db: {db}");
    println!();

    let store = if db == ":memory:" {
        InsightStore::in_memory()?
    } else {
        InsightStore::open(db)?
    };
    store.migrate()?;

    if args.iter().any(|a| a == "--seed-demo") {
        seed_demo(&store)?;
        println!("seeded demo history ({} rows)", store.transaction_count()?);
    }

    let Some(invoice_no) = arg_value(&args, "--invoice") else {
        println!("no --invoice given; nothing to submit");
        return Ok(());
    };

    let customer_id: i64 = arg_value(&args, "--customer")
        .ok_or_else(|| anyhow!("--customer is required"))?
        .parse()
        .context("--customer must be a positive integer")?;
    let invoice_date: NaiveDate = arg_value(&args, "--date")
        .ok_or_else(|| anyhow!("--date is required"))?
        .parse()
        .context("--date must be YYYY-MM-DD")?;

    let items: Vec<SubmittedItem> = args
        .windows(2)
        .filter(|w| w[0] == "--items")
        .map(|w| parse_item(&w[1]))
        .collect::<Result<_>>()?;
    if items.is_empty() {
        return Err(anyhow!("at least one --items entry is required"));
    }

    let service = InsightService::new(store, config);
    let outcome = service.submit(&NewTransactionRequest {
        invoice_no: invoice_no.to_string(),
        customer_id,
        invoice_date,
        country: None,
        items,
    })?;

    let record = outcome.rfm.record();
    println!("customer {customer_id}:");
    println!("  recency:   {} days", record.recency);
    println!("  frequency: {}", record.frequency);
    println!("  monetary:  {:.2}", record.monetary);
    println!("  profile:   {}", outcome.rfm.profile_label());
    println!();

    if outcome.recommendations.is_empty() {
        println!("no recommendations available");
    } else {
        println!("top recommendations:");
        println!("{}", serde_json::to_string_pretty(&outcome.recommendations)?);
    }

    Ok(())
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

// Only the code/quantity/price separators are structural; the
// description itself may contain colons.
fn parse_item(raw: &str) -> Result<SubmittedItem> {
    let malformed =
        || anyhow!("--items expects stock_code:description:quantity:unit_price, got '{raw}'");
    let (stock_code, rest) = raw.split_once(':').ok_or_else(malformed)?;
    let (rest, price_raw) = rest.rsplit_once(':').ok_or_else(malformed)?;
    let (description, quantity_raw) = rest.rsplit_once(':').ok_or_else(malformed)?;
    Ok(SubmittedItem {
        stock_code:  stock_code.to_string(),
        description: description.to_string(),
        quantity:    quantity_raw.parse().context("quantity must be an integer ≥ 1")?,
        unit_price:  price_raw.parse().context("unit_price must be a decimal ≥ 0.01")?,
    })
}


/// A small deterministic purchase history: three customers with
/// distinct recency/frequency/monetary footprints, so clustering has
/// something to separate, plus a varied catalog for the similarity
/// index. Invoice numbers are fresh uuids per run.
fn seed_demo(store: &InsightStore) -> Result<()> {
    let catalog: &[(&str, &str, f64)] = &[
        ("21730", "GLASS STAR FROSTED T-LIGHT HOLDER", 4.25),
        ("22633", "HAND WARMER UNION JACK", 1.85),
        ("22632", "HAND WARMER RED POLKA DOT", 1.85),
        ("84879", "ASSORTED COLOUR BIRD ORNAMENT", 1.69),
        ("22745", "POPPY'S PLAYHOUSE BEDROOM", 2.10),
        ("22748", "POPPY'S PLAYHOUSE KITCHEN", 2.10),
        ("21754", "HOME BUILDING BLOCK WORD", 5.95),
        ("21755", "LOVE BUILDING BLOCK WORD", 5.95),
        ("10002", "INFLATABLE POLITICAL GLOBE", 0.85),
        ("22310", "IVORY KNITTED MUG COSY", 1.65),
    ];

    // Per customer: (invoice date, catalog index, quantity), shaped to
    // give one frequent big spender, one moderate buyer, and one
    // long-dormant buyer.
    let history: &[(i64, &[(&str, usize, i64)])] = &[
        (1, &[("2024-01-05", 0, 12), ("2024-02-01", 1, 24), ("2024-02-20", 2, 24), ("2024-03-01", 3, 36)]),
        (2, &[("2024-01-15", 4, 6), ("2024-02-25", 5, 6)]),
        (3, &[("2023-09-10", 8, 2)]),
    ];

    for (customer_id, invoices) in history {
        for (date, item_index, quantity) in *invoices {
            let (code, description, price) = catalog[*item_index];
            let invoice_no = format!("DEMO-{}", uuid::Uuid::new_v4());
            let date: NaiveDate = date.parse()?;
            store.append_transactions(&[Transaction::new_line(
                &invoice_no,
                code,
                Some(description),
                *quantity,
                date,
                price,
                *customer_id,
                Some("United Kingdom"),
            )])?;
        }
    }

    // Remaining catalog items enter as single anonymous-customer rows
    // so the similarity index covers the full catalog.
    for (code, description, price) in &catalog[6..] {
        let invoice_no = format!("DEMO-{}", uuid::Uuid::new_v4());
        store.append_transactions(&[Transaction::new_line(
            &invoice_no,
            code,
            Some(description),
            1,
            NaiveDate::from_ymd_opt(2024, 1, 2).ok_or_else(|| anyhow!("bad demo date"))?,
            *price,
            4,
            Some("United Kingdom"),
        )])?;
    }

    Ok(())
}
