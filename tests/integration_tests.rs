//! Integration tests for trustbook-core

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use trustbook_core::{
    Address, BookingProvider, ExternalBatch, ExternalProperty, ExternalReservation,
    IngestionReconciler, MemoryStorage, Owner, ProcessorBalanceSnapshot,
    ReconciliationSnapshot, ReconciliationSnapshotEngine, SettlementTracker, SnapshotStatus,
    TaxJurisdiction, TaxType, TrustBalanceCalculator, TrustConfig, TrustError, TrustResult,
    TrustStorage,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn provider_batch() -> ExternalBatch {
    ExternalBatch {
        properties: vec![ExternalProperty {
            external_listing_id: "LST-100".to_string(),
            name: "Harborview Loft".to_string(),
            address: Address {
                street: Some("12 Pier Rd".to_string()),
                city: Some("Astoria".to_string()),
                region: Some("OR".to_string()),
                postal_code: Some("97103".to_string()),
            },
            active: true,
        }],
        reservations: vec![
            // Completed by June: 1000 total, 100 tax.
            ExternalReservation {
                confirmation_code: "HM-1".to_string(),
                external_listing_id: Some("LST-100".to_string()),
                guest_name: "Avery".to_string(),
                check_in: date(2024, 5, 1),
                check_out: date(2024, 5, 5),
                cancelled: false,
                total_amount: Some(BigDecimal::from(1000)),
                tax_amount: Some(BigDecimal::from(100)),
                host_service_fee: None,
                accommodation_fare: Some(BigDecimal::from(850)),
                cleaning_fee: Some(BigDecimal::from(50)),
                deposit_received: None,
                source: "airbnb".to_string(),
            },
            // Future stay holding a 400 deposit.
            ExternalReservation {
                confirmation_code: "HM-2".to_string(),
                external_listing_id: Some("LST-100".to_string()),
                guest_name: "Jordan".to_string(),
                check_in: date(2024, 7, 10),
                check_out: date(2024, 7, 15),
                cancelled: false,
                total_amount: Some(BigDecimal::from(1600)),
                tax_amount: Some(BigDecimal::from(160)),
                host_service_fee: Some(BigDecimal::from(40)),
                accommodation_fare: None,
                cleaning_fee: None,
                deposit_received: Some(BigDecimal::from(400)),
                source: "airbnb".to_string(),
            },
        ],
    }
}

/// Wire an ingested store up with an owner and jurisdiction the way an
/// operator would after the first sync.
async fn attach_owner_and_jurisdiction(storage: &mut MemoryStorage) {
    let mut owner = Owner::new("own-1".to_string(), "Dana Whitfield".to_string());
    owner.default_fee_percent = Some(BigDecimal::from(25));
    storage.save_owner(&owner).await.unwrap();

    let jurisdiction = TaxJurisdiction::new(
        "jur-1".to_string(),
        "Clatsop County".to_string(),
        TaxType::Occupancy,
        BigDecimal::from(10),
    );
    storage.save_jurisdiction(&jurisdiction).await.unwrap();

    let mut property = storage
        .find_property_by_listing("LST-100")
        .await
        .unwrap()
        .unwrap();
    property.owner_id = Some("own-1".to_string());
    property.tax_jurisdiction_id = Some("jur-1".to_string());
    storage.save_property(&property).await.unwrap();
}

#[tokio::test]
async fn test_complete_reconciliation_workflow() {
    let mut storage = MemoryStorage::new();
    let config = TrustConfig::default();

    // Ingest provider records.
    let mut reconciler = IngestionReconciler::new(storage.clone());
    let report = reconciler.merge(&provider_batch(), &config).await.unwrap();
    assert_eq!(report.properties_created, 1);
    assert_eq!(report.reservations_created, 2);

    attach_owner_and_jurisdiction(&mut storage).await;

    // Processor reports its balances in minor units; the operator enters
    // the reserve by hand.
    let mut processor = ProcessorBalanceSnapshot::from_minor_units(
        "stripe-2024-06-01".to_string(),
        date(2024, 6, 1),
        90_000,
        20_000,
    )
    .unwrap();
    processor.set_reserve(BigDecimal::from(100)).unwrap();
    storage.save_processor_snapshot(&processor).await.unwrap();

    // Expected balance as of June 1:
    //   future deposits        400  (HM-2)
    //   processor holdback     300  (200 pending + 100 reserve)
    //   unpaid owner payouts   675  (25% fee on net 900 of HM-1)
    //   unpaid tax             100  (HM-1)
    //   expected = 400 - 300 + 675 + 100 = 875
    let calculator = TrustBalanceCalculator::new(storage.clone());
    let balance = calculator
        .calculate_expected_balance(date(2024, 6, 1), &config)
        .await
        .unwrap();
    assert_eq!(balance.future_deposits, BigDecimal::from(400));
    assert_eq!(balance.processor_holdback, BigDecimal::from(300));
    assert_eq!(balance.unpaid_owner_payouts, BigDecimal::from(675));
    assert_eq!(balance.unpaid_tax_amount, BigDecimal::from(100));
    assert_eq!(balance.expected_balance, BigDecimal::from(875));

    // Snapshot: actual is 900 + 200 + 100 = 1200, variance +325 beyond the
    // default threshold of 100.
    let mut engine = ReconciliationSnapshotEngine::new(storage.clone());
    let snapshot = engine.create_snapshot(date(2024, 6, 1), &config).await.unwrap();
    assert_eq!(snapshot.status, SnapshotStatus::Variance);
    assert_eq!(snapshot.actual_balance, Some(BigDecimal::from(1200)));
    assert_eq!(snapshot.variance_amount, Some(BigDecimal::from(325)));

    let payout_items =
        ReconciliationSnapshot::parse_items(&snapshot.unpaid_payout_items).unwrap();
    assert_eq!(payout_items.len(), 1);
    assert_eq!(payout_items[0].label, "HM-1");
    assert_eq!(payout_items[0].amount, BigDecimal::from(675));

    // Settle the owner and the jurisdiction.
    let mut tracker = SettlementTracker::new(storage.clone());
    assert_eq!(
        tracker.record_owner_payout("own-1", date(2024, 6, 2)).await.unwrap(),
        1
    );
    assert_eq!(
        tracker
            .record_tax_remittance("jur-1", date(2024, 6, 3))
            .await
            .unwrap(),
        1
    );

    // The next balance run no longer carries the settled amounts.
    let after = calculator
        .calculate_expected_balance(date(2024, 6, 4), &config)
        .await
        .unwrap();
    assert_eq!(after.unpaid_owner_payouts, BigDecimal::from(0));
    assert_eq!(after.unpaid_tax_amount, BigDecimal::from(0));
    assert_eq!(after.expected_balance, BigDecimal::from(100));

    // Settlement is idempotent across runs.
    assert_eq!(
        tracker.record_owner_payout("own-1", date(2024, 6, 9)).await.unwrap(),
        0
    );

    let owner = storage.get_owner("own-1").await.unwrap().unwrap();
    assert_eq!(owner.last_payout_date, Some(date(2024, 6, 2)));
}

#[tokio::test]
async fn test_fee_override_changes_next_balance_run() {
    let mut storage = MemoryStorage::new();
    let config = TrustConfig::default();

    let mut reconciler = IngestionReconciler::new(storage.clone());
    reconciler.merge(&provider_batch(), &config).await.unwrap();
    attach_owner_and_jurisdiction(&mut storage).await;

    let calculator = TrustBalanceCalculator::new(storage.clone());
    let before = calculator
        .calculate_expected_balance(date(2024, 6, 1), &config)
        .await
        .unwrap();
    // Owner default 25% on net 900.
    assert_eq!(before.unpaid_owner_payouts, BigDecimal::from(675));

    // Property override wins on the very next run; nothing is cached.
    let mut property = storage
        .find_property_by_listing("LST-100")
        .await
        .unwrap()
        .unwrap();
    property.fee_percent_override = Some(BigDecimal::from(30));
    storage.save_property(&property).await.unwrap();

    let after = calculator
        .calculate_expected_balance(date(2024, 6, 1), &config)
        .await
        .unwrap();
    assert_eq!(after.unpaid_owner_payouts, BigDecimal::from(630));
}

#[tokio::test]
async fn test_draft_snapshot_without_processor_balance() {
    let storage = MemoryStorage::new();
    let config = TrustConfig::default();

    let mut reconciler = IngestionReconciler::new(storage.clone());
    reconciler.merge(&provider_batch(), &config).await.unwrap();

    let mut engine = ReconciliationSnapshotEngine::new(storage.clone());
    let snapshot = engine.create_snapshot(date(2024, 6, 1), &config).await.unwrap();

    assert_eq!(snapshot.status, SnapshotStatus::Draft);
    assert!(snapshot.actual_balance.is_none());
    assert!(snapshot.variance_amount.is_none());

    // The stored record is the same immutable row the engine returned.
    let stored = storage
        .get_reconciliation_snapshot(&snapshot.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored, snapshot);
}

#[tokio::test]
async fn test_reingest_after_settlement_preserves_flags() {
    let mut storage = MemoryStorage::new();
    let config = TrustConfig::default();

    let mut reconciler = IngestionReconciler::new(storage.clone());
    reconciler.merge(&provider_batch(), &config).await.unwrap();
    attach_owner_and_jurisdiction(&mut storage).await;

    let mut tracker = SettlementTracker::new(storage.clone());
    tracker.record_owner_payout("own-1", date(2024, 6, 2)).await.unwrap();

    // The channel re-sends the same records; the settled flag must survive.
    let report = reconciler.merge(&provider_batch(), &config).await.unwrap();
    assert_eq!(report.total_created(), 0);

    let settled = storage
        .find_reservation_by_confirmation("HM-1")
        .await
        .unwrap()
        .unwrap();
    assert!(settled.owner_paid_out);
    assert_eq!(settled.owner_paid_out_date, Some(date(2024, 6, 2)));
}

struct FlakyProvider {
    batch: ExternalBatch,
}

#[async_trait::async_trait]
impl BookingProvider for FlakyProvider {
    async fn fetch_page(&self, page: usize) -> TrustResult<Option<ExternalBatch>> {
        match page {
            0 => Ok(Some(self.batch.clone())),
            _ => Err(TrustError::Storage("upstream timeout".to_string())),
        }
    }
}

#[tokio::test]
async fn test_sync_failure_reports_partial_progress() {
    let storage = MemoryStorage::new();
    let mut reconciler = IngestionReconciler::new(storage.clone());

    let provider = FlakyProvider {
        batch: provider_batch(),
    };
    let result = reconciler.sync_from(&provider, &TrustConfig::default()).await;

    match result {
        Err(TrustError::Sync { report, .. }) => {
            assert_eq!(report.properties_created, 1);
            assert_eq!(report.reservations_created, 2);
        }
        other => panic!("expected sync error, got {:?}", other.map(|r| r.to_string())),
    }

    // The committed first page is still there.
    assert_eq!(storage.list_reservations().await.unwrap().len(), 2);
    assert!(reconciler.progress().finished);
}
