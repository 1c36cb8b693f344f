//! In-memory storage implementation for testing and development

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::traits::*;
use crate::types::*;

#[derive(Debug, Default)]
struct StoreState {
    owners: HashMap<String, Owner>,
    properties: HashMap<String, Property>,
    reservations: HashMap<String, Reservation>,
    jurisdictions: HashMap<String, TaxJurisdiction>,
    processor_snapshots: HashMap<String, ProcessorBalanceSnapshot>,
    reconciliation_snapshots: HashMap<String, ReconciliationSnapshot>,
}

/// In-memory storage implementation for testing and development
///
/// All entity maps live behind one lock so a [`WriteBatch`] applies under a
/// single write guard: readers see either none of a batch or all of it, and
/// a batch that fails validation writes nothing. Clones share the same
/// underlying store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    state: Arc<RwLock<StoreState>>,
}

impl MemoryStorage {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) {
        let mut state = self.state.write().unwrap();
        *state = StoreState::default();
    }
}

#[async_trait]
impl TrustStorage for MemoryStorage {
    async fn save_owner(&mut self, owner: &Owner) -> TrustResult<()> {
        self.state
            .write()
            .unwrap()
            .owners
            .insert(owner.id.clone(), owner.clone());
        Ok(())
    }

    async fn get_owner(&self, owner_id: &str) -> TrustResult<Option<Owner>> {
        Ok(self.state.read().unwrap().owners.get(owner_id).cloned())
    }

    async fn list_owners(&self) -> TrustResult<Vec<Owner>> {
        Ok(self.state.read().unwrap().owners.values().cloned().collect())
    }

    async fn save_property(&mut self, property: &Property) -> TrustResult<()> {
        self.state
            .write()
            .unwrap()
            .properties
            .insert(property.id.clone(), property.clone());
        Ok(())
    }

    async fn get_property(&self, property_id: &str) -> TrustResult<Option<Property>> {
        Ok(self
            .state
            .read()
            .unwrap()
            .properties
            .get(property_id)
            .cloned())
    }

    async fn find_property_by_listing(
        &self,
        external_listing_id: &str,
    ) -> TrustResult<Option<Property>> {
        Ok(self
            .state
            .read()
            .unwrap()
            .properties
            .values()
            .find(|p| p.external_listing_id == external_listing_id)
            .cloned())
    }

    async fn list_properties(&self) -> TrustResult<Vec<Property>> {
        Ok(self
            .state
            .read()
            .unwrap()
            .properties
            .values()
            .cloned()
            .collect())
    }

    async fn save_reservation(&mut self, reservation: &Reservation) -> TrustResult<()> {
        self.state
            .write()
            .unwrap()
            .reservations
            .insert(reservation.id.clone(), reservation.clone());
        Ok(())
    }

    async fn get_reservation(&self, reservation_id: &str) -> TrustResult<Option<Reservation>> {
        Ok(self
            .state
            .read()
            .unwrap()
            .reservations
            .get(reservation_id)
            .cloned())
    }

    async fn find_reservation_by_confirmation(
        &self,
        confirmation_code: &str,
    ) -> TrustResult<Option<Reservation>> {
        Ok(self
            .state
            .read()
            .unwrap()
            .reservations
            .values()
            .find(|r| r.confirmation_code == confirmation_code)
            .cloned())
    }

    async fn list_reservations(&self) -> TrustResult<Vec<Reservation>> {
        Ok(self
            .state
            .read()
            .unwrap()
            .reservations
            .values()
            .cloned()
            .collect())
    }

    async fn save_jurisdiction(&mut self, jurisdiction: &TaxJurisdiction) -> TrustResult<()> {
        self.state
            .write()
            .unwrap()
            .jurisdictions
            .insert(jurisdiction.id.clone(), jurisdiction.clone());
        Ok(())
    }

    async fn get_jurisdiction(
        &self,
        jurisdiction_id: &str,
    ) -> TrustResult<Option<TaxJurisdiction>> {
        Ok(self
            .state
            .read()
            .unwrap()
            .jurisdictions
            .get(jurisdiction_id)
            .cloned())
    }

    async fn list_jurisdictions(&self) -> TrustResult<Vec<TaxJurisdiction>> {
        Ok(self
            .state
            .read()
            .unwrap()
            .jurisdictions
            .values()
            .cloned()
            .collect())
    }

    async fn save_processor_snapshot(
        &mut self,
        snapshot: &ProcessorBalanceSnapshot,
    ) -> TrustResult<()> {
        self.state
            .write()
            .unwrap()
            .processor_snapshots
            .insert(snapshot.id.clone(), snapshot.clone());
        Ok(())
    }

    async fn latest_processor_snapshot(&self) -> TrustResult<Option<ProcessorBalanceSnapshot>> {
        Ok(self
            .state
            .read()
            .unwrap()
            .processor_snapshots
            .values()
            .max_by_key(|s| (s.snapshot_date, s.created_at))
            .cloned())
    }

    async fn save_reconciliation_snapshot(
        &mut self,
        snapshot: &ReconciliationSnapshot,
    ) -> TrustResult<()> {
        let mut state = self.state.write().unwrap();
        if state.reconciliation_snapshots.contains_key(&snapshot.id) {
            return Err(TrustError::Validation {
                entity: "ReconciliationSnapshot",
                id: snapshot.id.clone(),
                message: "snapshots are immutable; create a new one instead".to_string(),
            });
        }
        state
            .reconciliation_snapshots
            .insert(snapshot.id.clone(), snapshot.clone());
        Ok(())
    }

    async fn get_reconciliation_snapshot(
        &self,
        snapshot_id: &str,
    ) -> TrustResult<Option<ReconciliationSnapshot>> {
        Ok(self
            .state
            .read()
            .unwrap()
            .reconciliation_snapshots
            .get(snapshot_id)
            .cloned())
    }

    async fn list_reconciliation_snapshots(&self) -> TrustResult<Vec<ReconciliationSnapshot>> {
        Ok(self
            .state
            .read()
            .unwrap()
            .reconciliation_snapshots
            .values()
            .cloned()
            .collect())
    }

    async fn apply_batch(&mut self, batch: WriteBatch) -> TrustResult<()> {
        let mut state = self.state.write().unwrap();
        let ops = batch.into_ops();

        // Validate the whole batch before touching any map, so a rejected
        // batch leaves no partial state behind.
        for op in &ops {
            if let WriteOp::PutReconciliationSnapshot(snapshot) = op {
                if state.reconciliation_snapshots.contains_key(&snapshot.id) {
                    return Err(TrustError::Validation {
                        entity: "ReconciliationSnapshot",
                        id: snapshot.id.clone(),
                        message: "snapshots are immutable; create a new one instead".to_string(),
                    });
                }
            }
        }

        for op in ops {
            match op {
                WriteOp::PutOwner(owner) => {
                    state.owners.insert(owner.id.clone(), owner);
                }
                WriteOp::PutProperty(property) => {
                    state.properties.insert(property.id.clone(), property);
                }
                WriteOp::PutReservation(reservation) => {
                    state
                        .reservations
                        .insert(reservation.id.clone(), reservation);
                }
                WriteOp::PutJurisdiction(jurisdiction) => {
                    state
                        .jurisdictions
                        .insert(jurisdiction.id.clone(), jurisdiction);
                }
                WriteOp::PutProcessorSnapshot(snapshot) => {
                    state
                        .processor_snapshots
                        .insert(snapshot.id.clone(), snapshot);
                }
                WriteOp::PutReconciliationSnapshot(snapshot) => {
                    state
                        .reconciliation_snapshots
                        .insert(snapshot.id.clone(), snapshot);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn batch_applies_all_or_nothing() {
        let mut storage = MemoryStorage::new();

        let snapshot = ReconciliationSnapshot {
            id: "snap-1".to_string(),
            reconciliation_date: date(2024, 6, 1),
            status: SnapshotStatus::Draft,
            expected_balance: BigDecimal::from(0),
            actual_balance: None,
            variance_amount: None,
            future_deposits: BigDecimal::from(0),
            processor_holdback: BigDecimal::from(0),
            unpaid_owner_payouts: BigDecimal::from(0),
            unpaid_tax_amount: BigDecimal::from(0),
            future_deposit_items: "[]".to_string(),
            unpaid_payout_items: "[]".to_string(),
            unpaid_tax_items: "[]".to_string(),
            created_at: chrono::Utc::now().naive_utc(),
        };
        storage.save_reconciliation_snapshot(&snapshot).await.unwrap();

        // Batch carrying an owner plus a duplicate snapshot id must apply
        // neither.
        let mut batch = WriteBatch::new();
        batch.put_owner(Owner::new("o1".to_string(), "Dana".to_string()));
        batch.put_reconciliation_snapshot(snapshot.clone());

        assert!(storage.apply_batch(batch).await.is_err());
        assert!(storage.get_owner("o1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn latest_processor_snapshot_orders_by_date() {
        let mut storage = MemoryStorage::new();

        for (id, day) in [("old", 1), ("newest", 20), ("middle", 10)] {
            let snapshot = ProcessorBalanceSnapshot::new(
                id.to_string(),
                date(2024, 6, day),
                BigDecimal::from(100),
                BigDecimal::from(0),
                BigDecimal::from(0),
            )
            .unwrap();
            storage.save_processor_snapshot(&snapshot).await.unwrap();
        }

        let latest = storage.latest_processor_snapshot().await.unwrap().unwrap();
        assert_eq!(latest.id, "newest");
    }

    #[tokio::test]
    async fn lookup_by_external_keys() {
        let mut storage = MemoryStorage::new();

        let property = Property::new(
            "p1".to_string(),
            "Cabin".to_string(),
            "LST-1".to_string(),
        );
        storage.save_property(&property).await.unwrap();

        let reservation = Reservation::new(
            "r1".to_string(),
            "CONF-1".to_string(),
            date(2024, 7, 1),
            date(2024, 7, 5),
        );
        storage.save_reservation(&reservation).await.unwrap();

        assert!(storage
            .find_property_by_listing("LST-1")
            .await
            .unwrap()
            .is_some());
        assert!(storage
            .find_property_by_listing("LST-404")
            .await
            .unwrap()
            .is_none());
        assert!(storage
            .find_reservation_by_confirmation("CONF-1")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn clones_share_state() {
        let mut storage = MemoryStorage::new();
        let viewer = storage.clone();

        storage
            .save_owner(&Owner::new("o1".to_string(), "Dana".to_string()))
            .await
            .unwrap();

        assert!(viewer.get_owner("o1").await.unwrap().is_some());

        storage.clear();
        assert!(viewer.get_owner("o1").await.unwrap().is_none());
    }
}
