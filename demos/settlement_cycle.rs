//! Settlement example: owner payouts and tax remittances
//!
//! Run with: cargo run --example settlement_cycle

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use trustbook_core::{
    MemoryStorage, Owner, Property, Reservation, SettlementTracker, TaxJurisdiction, TaxType,
    TrustStorage,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut storage = MemoryStorage::new();

    println!("=== Settlement Example ===\n");

    let owner = Owner::new("own-1".to_string(), "Dana Whitfield".to_string());
    storage.save_owner(&owner).await?;

    let jurisdiction = TaxJurisdiction::new(
        "jur-1".to_string(),
        "Clatsop County".to_string(),
        TaxType::Occupancy,
        BigDecimal::from(10),
    );
    storage.save_jurisdiction(&jurisdiction).await?;

    let mut property = Property::new(
        "prop-1".to_string(),
        "Harborview Loft".to_string(),
        "LST-100".to_string(),
    );
    property.owner_id = Some(owner.id.clone());
    property.tax_jurisdiction_id = Some(jurisdiction.id.clone());
    storage.save_property(&property).await?;

    // Two completed stays, one still upcoming.
    for (id, check_in, check_out, tax) in [
        ("res-1", date(2024, 5, 1), date(2024, 5, 5), 90),
        ("res-2", date(2024, 5, 12), date(2024, 5, 16), 110),
        ("res-3", date(2024, 7, 1), date(2024, 7, 4), 80),
    ] {
        let mut r = Reservation::new(id.to_string(), format!("HM-{}", id), check_in, check_out);
        r.property_id = Some(property.id.clone());
        r.total_amount = BigDecimal::from(1000);
        r.tax_amount = BigDecimal::from(tax);
        storage.save_reservation(&r).await?;
    }

    let mut tracker = SettlementTracker::new(storage.clone());

    let paid = tracker.record_owner_payout("own-1", date(2024, 6, 1)).await?;
    println!("Owner payout run settled {} reservations", paid);

    let again = tracker.record_owner_payout("own-1", date(2024, 6, 8)).await?;
    println!("Second payout run settled {} (idempotent)", again);

    let remitted = tracker
        .record_tax_remittance("jur-1", date(2024, 6, 20))
        .await?;
    println!("Tax remittance run settled {} reservations", remitted);

    let owner = storage.get_owner("own-1").await?.unwrap();
    println!(
        "\nOwner last payout date: {}",
        owner
            .last_payout_date
            .map(|d| d.to_string())
            .unwrap_or_default()
    );

    let jurisdiction = storage.get_jurisdiction("jur-1").await?.unwrap();
    println!(
        "Jurisdiction last remittance date: {}",
        jurisdiction
            .last_remittance_date
            .map(|d| d.to_string())
            .unwrap_or_default()
    );

    // The upcoming stay is untouched until it completes.
    let upcoming = storage.get_reservation("res-3").await?.unwrap();
    println!(
        "Upcoming stay settled: payout={}, tax={}",
        upcoming.owner_paid_out, upcoming.tax_remitted
    );

    Ok(())
}
