//! Idempotent settlement bookkeeping for owner payouts and tax remittances

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

use crate::traits::{TrustStorage, WriteBatch};
use crate::types::*;

/// Registry of in-flight settlement keys
///
/// At most one settlement run may touch a given owner or jurisdiction at a
/// time; a second caller gets one retry and then a
/// [`TrustError::ConcurrencyConflict`]. The registry is shared across
/// cloned trackers so the guarantee holds per process.
#[derive(Debug, Clone, Default)]
pub struct SettlementLockRegistry {
    keys: Arc<Mutex<HashSet<String>>>,
}

impl SettlementLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to claim a key, returning a guard that releases on drop
    pub fn try_acquire(&self, key: &str) -> Option<SettlementGuard> {
        let mut keys = self.keys.lock().unwrap();
        if keys.insert(key.to_string()) {
            Some(SettlementGuard {
                key: key.to_string(),
                registry: Arc::clone(&self.keys),
            })
        } else {
            None
        }
    }

    /// Claim a key, retrying once before surfacing a conflict
    fn acquire(&self, key: &str) -> TrustResult<SettlementGuard> {
        if let Some(guard) = self.try_acquire(key) {
            return Ok(guard);
        }
        std::thread::yield_now();
        self.try_acquire(key)
            .ok_or_else(|| TrustError::ConcurrencyConflict(key.to_string()))
    }
}

/// RAII guard for a claimed settlement key
#[derive(Debug)]
pub struct SettlementGuard {
    key: String,
    registry: Arc<Mutex<HashSet<String>>>,
}

impl Drop for SettlementGuard {
    fn drop(&mut self) {
        self.registry.lock().unwrap().remove(&self.key);
    }
}

/// Records owner payouts and tax remittances
///
/// Both operations are idempotent: a reservation already settled is never
/// revisited, and a run that finds nothing newly qualifying writes nothing
/// and returns zero. All flag updates plus the owner/jurisdiction record
/// update commit in one atomic batch.
pub struct SettlementTracker<S: TrustStorage> {
    storage: S,
    locks: SettlementLockRegistry,
}

impl<S: TrustStorage> SettlementTracker<S> {
    /// Create a tracker with its own lock registry
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            locks: SettlementLockRegistry::new(),
        }
    }

    /// Create a tracker sharing an existing lock registry
    ///
    /// Use this when several trackers run in one process so the per-key
    /// serialization spans all of them.
    pub fn with_lock_registry(storage: S, locks: SettlementLockRegistry) -> Self {
        Self { storage, locks }
    }

    /// Mark every outstanding completed booking of an owner as paid out
    ///
    /// Completion is judged against `payout_date`. Returns the number of
    /// reservations settled by this run; zero means the run was a no-op and
    /// nothing was written.
    pub async fn record_owner_payout(
        &mut self,
        owner_id: &str,
        payout_date: NaiveDate,
    ) -> TrustResult<usize> {
        let mut owner = self
            .storage
            .get_owner(owner_id)
            .await?
            .ok_or_else(|| TrustError::OwnerNotFound(owner_id.to_string()))?;

        let _guard = self.locks.acquire(&format!("owner:{}", owner_id))?;

        let property_ids: HashSet<String> = self
            .storage
            .list_properties()
            .await?
            .into_iter()
            .filter(|p| p.owner_id.as_deref() == Some(owner_id))
            .map(|p| p.id)
            .collect();

        let now = chrono::Utc::now().naive_utc();
        let mut batch = WriteBatch::new();
        let mut count = 0;

        for mut reservation in self.storage.list_reservations().await? {
            let belongs = reservation
                .property_id
                .as_ref()
                .is_some_and(|id| property_ids.contains(id));
            if !belongs || reservation.owner_paid_out || !reservation.is_completed(payout_date) {
                continue;
            }

            reservation.owner_paid_out = true;
            reservation.owner_paid_out_date = Some(payout_date);
            reservation.updated_at = now;
            batch.put_reservation(reservation);
            count += 1;
        }

        if count == 0 {
            return Ok(0);
        }

        owner.last_payout_date = Some(payout_date);
        owner.updated_at = now;
        batch.put_owner(owner);
        self.storage.apply_batch(batch).await?;

        tracing::info!(owner_id, count, %payout_date, "recorded owner payout");
        Ok(count)
    }

    /// Mark every outstanding completed booking in a jurisdiction as remitted
    ///
    /// A booking qualifies when its property is assigned to the
    /// jurisdiction, its stay is completed as of `remittance_date`, it
    /// carries tax, and the tax has not already been remitted.
    pub async fn record_tax_remittance(
        &mut self,
        jurisdiction_id: &str,
        remittance_date: NaiveDate,
    ) -> TrustResult<usize> {
        let mut jurisdiction = self
            .storage
            .get_jurisdiction(jurisdiction_id)
            .await?
            .ok_or_else(|| TrustError::JurisdictionNotFound(jurisdiction_id.to_string()))?;

        let _guard = self
            .locks
            .acquire(&format!("jurisdiction:{}", jurisdiction_id))?;

        let property_ids: HashSet<String> = self
            .storage
            .list_properties()
            .await?
            .into_iter()
            .filter(|p| p.tax_jurisdiction_id.as_deref() == Some(jurisdiction_id))
            .map(|p| p.id)
            .collect();

        let zero = bigdecimal::BigDecimal::from(0);
        let now = chrono::Utc::now().naive_utc();
        let mut batch = WriteBatch::new();
        let mut count = 0;

        for mut reservation in self.storage.list_reservations().await? {
            let belongs = reservation
                .property_id
                .as_ref()
                .is_some_and(|id| property_ids.contains(id));
            if !belongs
                || reservation.tax_remitted
                || reservation.tax_amount <= zero
                || !reservation.is_completed(remittance_date)
            {
                continue;
            }

            reservation.tax_remitted = true;
            reservation.tax_remitted_date = Some(remittance_date);
            reservation.updated_at = now;
            batch.put_reservation(reservation);
            count += 1;
        }

        if count == 0 {
            return Ok(0);
        }

        jurisdiction.last_remittance_date = Some(remittance_date);
        jurisdiction.updated_at = now;
        batch.put_jurisdiction(jurisdiction);
        self.storage.apply_batch(batch).await?;

        tracing::info!(
            jurisdiction_id,
            count,
            %remittance_date,
            "recorded tax remittance"
        );
        Ok(count)
    }

    /// Deliberately clear a booking's payout settlement so it can be
    /// settled again
    pub async fn reset_owner_payout(&mut self, reservation_id: &str) -> TrustResult<()> {
        let mut reservation = self
            .storage
            .get_reservation(reservation_id)
            .await?
            .ok_or_else(|| TrustError::ReservationNotFound(reservation_id.to_string()))?;

        reservation.owner_paid_out = false;
        reservation.owner_paid_out_date = None;
        reservation.updated_at = chrono::Utc::now().naive_utc();
        self.storage.save_reservation(&reservation).await
    }

    /// Deliberately clear a booking's tax settlement so it can be remitted
    /// again
    pub async fn reset_tax_remittance(&mut self, reservation_id: &str) -> TrustResult<()> {
        let mut reservation = self
            .storage
            .get_reservation(reservation_id)
            .await?
            .ok_or_else(|| TrustError::ReservationNotFound(reservation_id.to_string()))?;

        reservation.tax_remitted = false;
        reservation.tax_remitted_date = None;
        reservation.updated_at = chrono::Utc::now().naive_utc();
        self.storage.save_reservation(&reservation).await
    }

    /// Count the completed, unpaid reservations an owner payout would settle
    ///
    /// Convenience for callers sizing a payout before recording it.
    pub async fn outstanding_payout_count(
        &self,
        owner_id: &str,
        as_of: NaiveDate,
    ) -> TrustResult<usize> {
        let property_ids: HashSet<String> = self
            .storage
            .list_properties()
            .await?
            .into_iter()
            .filter(|p| p.owner_id.as_deref() == Some(owner_id))
            .map(|p| p.id)
            .collect();

        Ok(self
            .storage
            .list_reservations()
            .await?
            .iter()
            .filter(|r| {
                r.property_id
                    .as_ref()
                    .is_some_and(|id| property_ids.contains(id))
                    && !r.owner_paid_out
                    && r.is_completed(as_of)
            })
            .count())
    }
}
