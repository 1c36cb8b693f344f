//! Traits for storage abstraction and extensibility

use async_trait::async_trait;

use crate::types::*;

/// Storage abstraction for the trust accounting core
///
/// This trait allows the core to work with any durable entity store
/// (PostgreSQL, SQLite, an object store, in-memory, etc.). Implementations
/// must provide two guarantees:
///
/// - [`apply_batch`](Self::apply_batch) is atomic: either every operation
///   in the batch becomes visible, or none does. All multi-record mutations
///   in this crate (settlement runs, ingestion merges, snapshot creation)
///   go through a single batch.
/// - Reads are isolated from an in-flight batch; a reader never observes a
///   partially applied batch.
///
/// Reconciliation snapshots are append-only: `save_reconciliation_snapshot`
/// must reject an id that already exists, and no update path is offered.
#[async_trait]
pub trait TrustStorage: Send + Sync {
    /// Save (insert or replace) an owner
    async fn save_owner(&mut self, owner: &Owner) -> TrustResult<()>;

    /// Get an owner by ID
    async fn get_owner(&self, owner_id: &str) -> TrustResult<Option<Owner>>;

    /// List all owners
    async fn list_owners(&self) -> TrustResult<Vec<Owner>>;

    /// Save (insert or replace) a property
    async fn save_property(&mut self, property: &Property) -> TrustResult<()>;

    /// Get a property by ID
    async fn get_property(&self, property_id: &str) -> TrustResult<Option<Property>>;

    /// Find a property by its booking-provider listing id
    async fn find_property_by_listing(
        &self,
        external_listing_id: &str,
    ) -> TrustResult<Option<Property>>;

    /// List all properties
    async fn list_properties(&self) -> TrustResult<Vec<Property>>;

    /// Save (insert or replace) a reservation
    async fn save_reservation(&mut self, reservation: &Reservation) -> TrustResult<()>;

    /// Get a reservation by ID
    async fn get_reservation(&self, reservation_id: &str) -> TrustResult<Option<Reservation>>;

    /// Find a reservation by its booking confirmation code
    async fn find_reservation_by_confirmation(
        &self,
        confirmation_code: &str,
    ) -> TrustResult<Option<Reservation>>;

    /// List all reservations
    async fn list_reservations(&self) -> TrustResult<Vec<Reservation>>;

    /// Save (insert or replace) a tax jurisdiction
    async fn save_jurisdiction(&mut self, jurisdiction: &TaxJurisdiction) -> TrustResult<()>;

    /// Get a tax jurisdiction by ID
    async fn get_jurisdiction(&self, jurisdiction_id: &str)
        -> TrustResult<Option<TaxJurisdiction>>;

    /// List all tax jurisdictions
    async fn list_jurisdictions(&self) -> TrustResult<Vec<TaxJurisdiction>>;

    /// Save (insert or replace) a processor balance snapshot
    async fn save_processor_snapshot(
        &mut self,
        snapshot: &ProcessorBalanceSnapshot,
    ) -> TrustResult<()>;

    /// The most recent processor balance snapshot, by snapshot date
    async fn latest_processor_snapshot(&self) -> TrustResult<Option<ProcessorBalanceSnapshot>>;

    /// Insert a new reconciliation snapshot; must fail if the id exists
    async fn save_reconciliation_snapshot(
        &mut self,
        snapshot: &ReconciliationSnapshot,
    ) -> TrustResult<()>;

    /// Get a reconciliation snapshot by ID
    async fn get_reconciliation_snapshot(
        &self,
        snapshot_id: &str,
    ) -> TrustResult<Option<ReconciliationSnapshot>>;

    /// List all reconciliation snapshots
    async fn list_reconciliation_snapshots(&self) -> TrustResult<Vec<ReconciliationSnapshot>>;

    /// Apply a write batch atomically
    async fn apply_batch(&mut self, batch: WriteBatch) -> TrustResult<()>;
}

/// A single operation inside a [`WriteBatch`]
#[derive(Debug, Clone)]
pub enum WriteOp {
    PutOwner(Owner),
    PutProperty(Property),
    PutReservation(Reservation),
    PutJurisdiction(TaxJurisdiction),
    PutProcessorSnapshot(ProcessorBalanceSnapshot),
    /// Insert-only; applying a batch fails if the snapshot id already exists
    PutReconciliationSnapshot(ReconciliationSnapshot),
}

/// An ordered set of writes that must commit together
///
/// Built by settlement, ingestion, and the snapshot engine so that a crash
/// or validation failure mid-operation leaves no partial state.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_owner(&mut self, owner: Owner) {
        self.ops.push(WriteOp::PutOwner(owner));
    }

    pub fn put_property(&mut self, property: Property) {
        self.ops.push(WriteOp::PutProperty(property));
    }

    pub fn put_reservation(&mut self, reservation: Reservation) {
        self.ops.push(WriteOp::PutReservation(reservation));
    }

    pub fn put_jurisdiction(&mut self, jurisdiction: TaxJurisdiction) {
        self.ops.push(WriteOp::PutJurisdiction(jurisdiction));
    }

    pub fn put_processor_snapshot(&mut self, snapshot: ProcessorBalanceSnapshot) {
        self.ops.push(WriteOp::PutProcessorSnapshot(snapshot));
    }

    pub fn put_reconciliation_snapshot(&mut self, snapshot: ReconciliationSnapshot) {
        self.ops.push(WriteOp::PutReconciliationSnapshot(snapshot));
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Consume the batch, yielding its operations in insertion order
    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// Trait for validating records before they are persisted
///
/// Ingestion runs every incoming record through a validator before the
/// merge batch is built, so a malformed record is rejected with no write.
pub trait RecordValidator: Send + Sync {
    /// Validate an owner before saving
    fn validate_owner(&self, owner: &Owner) -> TrustResult<()>;

    /// Validate a property before saving
    fn validate_property(&self, property: &Property) -> TrustResult<()>;

    /// Validate a reservation before saving
    fn validate_reservation(&self, reservation: &Reservation) -> TrustResult<()>;
}

/// Default record validator with the core invariants
pub struct DefaultRecordValidator;

impl RecordValidator for DefaultRecordValidator {
    fn validate_owner(&self, owner: &Owner) -> TrustResult<()> {
        crate::utils::validation::validate_required_id("Owner", &owner.id, "id")?;
        if let Some(percent) = &owner.default_fee_percent {
            crate::utils::validation::validate_fee_percent("Owner", &owner.id, percent)?;
        }
        Ok(())
    }

    fn validate_property(&self, property: &Property) -> TrustResult<()> {
        crate::utils::validation::validate_required_id("Property", &property.id, "id")?;
        crate::utils::validation::validate_required_id(
            "Property",
            &property.external_listing_id,
            "external_listing_id",
        )?;
        if let Some(percent) = &property.fee_percent_override {
            crate::utils::validation::validate_fee_percent("Property", &property.id, percent)?;
        }
        Ok(())
    }

    fn validate_reservation(&self, reservation: &Reservation) -> TrustResult<()> {
        crate::utils::validation::validate_required_id("Reservation", &reservation.id, "id")?;
        crate::utils::validation::validate_required_id(
            "Reservation",
            &reservation.confirmation_code,
            "confirmation_code",
        )?;
        crate::utils::validation::validate_stay_dates(reservation)?;
        for (field, amount) in [
            ("total_amount", &reservation.total_amount),
            ("tax_amount", &reservation.tax_amount),
            ("host_service_fee", &reservation.host_service_fee),
            ("accommodation_fare", &reservation.accommodation_fare),
            ("cleaning_fee", &reservation.cleaning_fee),
            ("deposit_received", &reservation.deposit_received),
        ] {
            crate::utils::validation::validate_non_negative(
                "Reservation",
                &reservation.id,
                field,
                amount,
            )?;
        }
        Ok(())
    }
}
