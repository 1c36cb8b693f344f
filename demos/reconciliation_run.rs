//! End-to-end reconciliation example
//!
//! Seeds a small portfolio, records a processor balance, and creates a
//! reconciliation snapshot.
//!
//! Run with: cargo run --example reconciliation_run

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use trustbook_core::{
    MemoryStorage, Owner, ProcessorBalanceSnapshot, Property, ReconciliationSnapshot,
    ReconciliationSnapshotEngine, Reservation, TrustBalanceCalculator, TrustConfig, TrustStorage,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut storage = MemoryStorage::new();
    let config = TrustConfig::default();
    let today = date(2024, 6, 1);

    println!("=== Trust Reconciliation Example ===\n");

    // Owner with a 25% default fee, one property.
    let mut owner = Owner::new("own-1".to_string(), "Dana Whitfield".to_string());
    owner.default_fee_percent = Some(BigDecimal::from(25));
    storage.save_owner(&owner).await?;

    let mut property = Property::new(
        "prop-1".to_string(),
        "Harborview Loft".to_string(),
        "LST-100".to_string(),
    );
    property.owner_id = Some(owner.id.clone());
    storage.save_property(&property).await?;

    // A completed stay awaiting payout and tax remittance.
    let mut completed = Reservation::new(
        "res-1".to_string(),
        "HM-1".to_string(),
        date(2024, 5, 1),
        date(2024, 5, 5),
    );
    completed.property_id = Some(property.id.clone());
    completed.guest_name = "Avery".to_string();
    completed.total_amount = BigDecimal::from(1000);
    completed.tax_amount = BigDecimal::from(100);
    storage.save_reservation(&completed).await?;

    // A future stay holding a deposit in trust.
    let mut upcoming = Reservation::new(
        "res-2".to_string(),
        "HM-2".to_string(),
        date(2024, 7, 10),
        date(2024, 7, 15),
    );
    upcoming.property_id = Some(property.id.clone());
    upcoming.guest_name = "Jordan".to_string();
    upcoming.total_amount = BigDecimal::from(1600);
    upcoming.deposit_received = BigDecimal::from(400);
    storage.save_reservation(&upcoming).await?;

    // Processor balances arrive in minor units; the reserve is keyed in by
    // an operator.
    let mut processor = ProcessorBalanceSnapshot::from_minor_units(
        "stripe-2024-06-01".to_string(),
        today,
        90_000,
        20_000,
    )?;
    processor.set_reserve(BigDecimal::from(100))?;
    storage.save_processor_snapshot(&processor).await?;

    // Derive the expected trust balance.
    let calculator = TrustBalanceCalculator::new(storage.clone());
    let balance = calculator.calculate_expected_balance(today, &config).await?;

    println!("Expected trust balance as of {}:", today);
    println!("  Future deposits:      {}", balance.future_deposits);
    println!("  Processor holdback:  -{}", balance.processor_holdback);
    println!("  Unpaid owner payouts: {}", balance.unpaid_owner_payouts);
    println!("  Unpaid tax:           {}", balance.unpaid_tax_amount);
    println!("  Expected:             {}\n", balance.expected_balance);

    // Create the immutable snapshot.
    let mut engine = ReconciliationSnapshotEngine::new(storage.clone());
    let snapshot = engine.create_snapshot(today, &config).await?;

    println!("Snapshot {}:", snapshot.id);
    println!("  Status:   {}", snapshot.status.label());
    println!(
        "  Actual:   {}",
        snapshot
            .actual_balance
            .as_ref()
            .map(|b| b.to_string())
            .unwrap_or_else(|| "n/a".to_string())
    );
    println!(
        "  Variance: {}",
        snapshot
            .variance_amount
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "n/a".to_string())
    );

    let items = ReconciliationSnapshot::parse_items(&snapshot.unpaid_payout_items)?;
    println!("\nUnpaid payout line items:");
    for item in items {
        println!(
            "  {} ({}) due {}: {}",
            item.label,
            item.secondary_label.unwrap_or_default(),
            item.date,
            item.amount
        );
    }

    Ok(())
}
