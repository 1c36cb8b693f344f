//! Immutable reconciliation snapshot creation

use chrono::NaiveDate;
use uuid::Uuid;

use crate::reconciliation::balance::TrustBalanceCalculator;
use crate::traits::{TrustStorage, WriteBatch};
use crate::types::*;

/// Builds and stores point-in-time comparisons of expected vs. actual balance
///
/// Every run inserts a brand-new snapshot; existing snapshots are never
/// touched. Status transitions therefore only happen by creating another
/// snapshot.
pub struct ReconciliationSnapshotEngine<S: TrustStorage> {
    storage: S,
    calculator: TrustBalanceCalculator<S>,
}

impl<S: TrustStorage + Clone> ReconciliationSnapshotEngine<S> {
    /// Create an engine over the given storage handle
    pub fn new(storage: S) -> Self {
        Self {
            calculator: TrustBalanceCalculator::new(storage.clone()),
            storage,
        }
    }

    /// Create and persist a reconciliation snapshot as of a date
    ///
    /// The actual balance comes from the latest processor balance snapshot.
    /// When none exists the comparison is incomplete and the snapshot is
    /// stored as [`SnapshotStatus::Draft`] with no actual or variance
    /// amount. Otherwise the variance is signed (positive means the
    /// processor holds more than expected) and classified against
    /// `config.variance_threshold`.
    pub async fn create_snapshot(
        &mut self,
        as_of: NaiveDate,
        config: &TrustConfig,
    ) -> TrustResult<ReconciliationSnapshot> {
        let balance = self
            .calculator
            .calculate_expected_balance(as_of, config)
            .await?;

        let processor_snapshot = self.storage.latest_processor_snapshot().await?;
        let actual_balance = processor_snapshot
            .as_ref()
            .map(|snapshot| snapshot.total_balance.clone());

        let (status, variance_amount) = match &actual_balance {
            None => (SnapshotStatus::Draft, None),
            Some(actual) => {
                let variance = actual - &balance.expected_balance;
                let status = if variance.abs() <= config.variance_threshold {
                    SnapshotStatus::Balanced
                } else {
                    SnapshotStatus::Variance
                };
                (status, Some(variance))
            }
        };

        let snapshot = ReconciliationSnapshot {
            id: Uuid::new_v4().to_string(),
            reconciliation_date: as_of,
            status,
            expected_balance: balance.expected_balance.clone(),
            actual_balance,
            variance_amount,
            future_deposits: balance.future_deposits,
            processor_holdback: balance.processor_holdback,
            unpaid_owner_payouts: balance.unpaid_owner_payouts,
            unpaid_tax_amount: balance.unpaid_tax_amount,
            future_deposit_items: serialize_items(&balance.future_deposit_items)?,
            unpaid_payout_items: serialize_items(&balance.unpaid_payout_items)?,
            unpaid_tax_items: serialize_items(&balance.unpaid_tax_items)?,
            created_at: chrono::Utc::now().naive_utc(),
        };

        // The snapshot insert and the processor back-link commit together.
        let mut batch = WriteBatch::new();
        batch.put_reconciliation_snapshot(snapshot.clone());
        if let Some(mut processor) = processor_snapshot {
            processor.reconciliation_snapshot_id = Some(snapshot.id.clone());
            batch.put_processor_snapshot(processor);
        }
        self.storage.apply_batch(batch).await?;

        tracing::info!(
            snapshot_id = %snapshot.id,
            status = snapshot.status.label(),
            expected = %snapshot.expected_balance,
            variance = snapshot
                .variance_amount
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_default(),
            "created reconciliation snapshot"
        );

        Ok(snapshot)
    }
}

fn serialize_items(items: &[AuditLineItem]) -> TrustResult<String> {
    serde_json::to_string(items)
        .map_err(|e| TrustError::Serialization(format!("audit payload: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_storage::MemoryStorage;
    use bigdecimal::BigDecimal;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn seed_completed_reservation(storage: &mut MemoryStorage, total: i64, tax: i64) {
        let mut r = Reservation::new(
            "r1".to_string(),
            "CONF-1".to_string(),
            date(2024, 5, 1),
            date(2024, 5, 5),
        );
        r.total_amount = BigDecimal::from(total);
        r.tax_amount = BigDecimal::from(tax);
        storage.save_reservation(&r).await.unwrap();
    }

    #[tokio::test]
    async fn no_processor_snapshot_forces_draft() {
        let mut storage = MemoryStorage::new();
        seed_completed_reservation(&mut storage, 1000, 100).await;

        let mut engine = ReconciliationSnapshotEngine::new(storage);
        let snapshot = engine
            .create_snapshot(date(2024, 6, 1), &TrustConfig::default())
            .await
            .unwrap();

        assert_eq!(snapshot.status, SnapshotStatus::Draft);
        assert!(snapshot.actual_balance.is_none());
        assert!(snapshot.variance_amount.is_none());
        // Expected side is still derived: 720 payout + 100 tax.
        assert_eq!(snapshot.expected_balance, BigDecimal::from(820));
    }

    #[tokio::test]
    async fn variance_classification_respects_threshold_boundary() {
        // Expected balance is 820 (completed booking, no holdback).
        for (actual, expected_status) in [
            (BigDecimal::from(920), SnapshotStatus::Balanced),
            ("920.01".parse::<BigDecimal>().unwrap(), SnapshotStatus::Variance),
        ] {
            let mut storage = MemoryStorage::new();
            seed_completed_reservation(&mut storage, 1000, 100).await;

            let processor = ProcessorBalanceSnapshot::new(
                "ps1".to_string(),
                date(2024, 6, 1),
                actual,
                BigDecimal::from(0),
                BigDecimal::from(0),
            )
            .unwrap();
            storage.save_processor_snapshot(&processor).await.unwrap();

            let mut engine = ReconciliationSnapshotEngine::new(storage);
            let snapshot = engine
                .create_snapshot(date(2024, 6, 1), &TrustConfig::default())
                .await
                .unwrap();

            assert_eq!(snapshot.status, expected_status);
        }
    }

    #[tokio::test]
    async fn variance_is_signed() {
        let mut storage = MemoryStorage::new();
        seed_completed_reservation(&mut storage, 1000, 100).await;

        let processor = ProcessorBalanceSnapshot::new(
            "ps1".to_string(),
            date(2024, 6, 1),
            BigDecimal::from(500),
            BigDecimal::from(0),
            BigDecimal::from(0),
        )
        .unwrap();
        storage.save_processor_snapshot(&processor).await.unwrap();

        let mut engine = ReconciliationSnapshotEngine::new(storage);
        let snapshot = engine
            .create_snapshot(date(2024, 6, 1), &TrustConfig::default())
            .await
            .unwrap();

        // Processor holds less than expected: negative variance.
        assert_eq!(snapshot.variance_amount, Some(BigDecimal::from(-320)));
        assert_eq!(snapshot.status, SnapshotStatus::Variance);
    }

    #[tokio::test]
    async fn audit_payloads_round_trip() {
        let mut storage = MemoryStorage::new();
        seed_completed_reservation(&mut storage, 1000, 100).await;

        let mut engine = ReconciliationSnapshotEngine::new(storage);
        let snapshot = engine
            .create_snapshot(date(2024, 6, 1), &TrustConfig::default())
            .await
            .unwrap();

        let payout_items = ReconciliationSnapshot::parse_items(&snapshot.unpaid_payout_items)
            .unwrap();
        assert_eq!(payout_items.len(), 1);
        assert_eq!(payout_items[0].label, "CONF-1");
        assert_eq!(payout_items[0].amount, BigDecimal::from(720));

        let tax_items = ReconciliationSnapshot::parse_items(&snapshot.unpaid_tax_items).unwrap();
        assert_eq!(tax_items[0].amount, BigDecimal::from(100));
    }

    #[tokio::test]
    async fn snapshots_are_immutable_and_append_only() {
        let mut storage = MemoryStorage::new();
        seed_completed_reservation(&mut storage, 1000, 100).await;

        let mut engine = ReconciliationSnapshotEngine::new(storage.clone());
        let first = engine
            .create_snapshot(date(2024, 6, 1), &TrustConfig::default())
            .await
            .unwrap();

        // Re-inserting under the same id is rejected by storage.
        let result = storage.save_reconciliation_snapshot(&first).await;
        assert!(matches!(result, Err(TrustError::Validation { .. })));

        // A correction is a new snapshot, not a mutation.
        let second = engine
            .create_snapshot(date(2024, 6, 2), &TrustConfig::default())
            .await
            .unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(storage.list_reconciliation_snapshots().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn processor_snapshot_is_back_linked() {
        let mut storage = MemoryStorage::new();
        let processor = ProcessorBalanceSnapshot::new(
            "ps1".to_string(),
            date(2024, 6, 1),
            BigDecimal::from(100),
            BigDecimal::from(0),
            BigDecimal::from(0),
        )
        .unwrap();
        storage.save_processor_snapshot(&processor).await.unwrap();

        let mut engine = ReconciliationSnapshotEngine::new(storage.clone());
        let snapshot = engine
            .create_snapshot(date(2024, 6, 1), &TrustConfig::default())
            .await
            .unwrap();

        let linked = storage.latest_processor_snapshot().await.unwrap().unwrap();
        assert_eq!(linked.reconciliation_snapshot_id, Some(snapshot.id));
    }
}
