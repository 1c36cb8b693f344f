//! Ingestion of externally-sourced property and booking records
//!
//! The booking provider hands over normalized records; the reconciler
//! merges them into the local store by stable external identifier. An
//! absent monetary field on an incoming record always means zero; that is
//! a rule of the provider contract, not an accident of null handling.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::finance::ReservationFinancialCalculator;
use crate::traits::{DefaultRecordValidator, RecordValidator, TrustStorage, WriteBatch};
use crate::types::*;

/// Normalized property record from the booking provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalProperty {
    /// Stable listing identifier; the merge key
    pub external_listing_id: String,
    /// Listing display name
    pub name: String,
    /// Postal address
    pub address: Address,
    /// Whether the listing is live on the channel
    pub active: bool,
}

/// Normalized reservation record from the booking provider
///
/// Monetary fields are optional on the wire; absence maps to zero at merge
/// time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalReservation {
    /// Booking confirmation code; the merge key
    pub confirmation_code: String,
    /// Listing the booking belongs to, when the provider reports one
    pub external_listing_id: Option<String>,
    /// Primary guest name
    pub guest_name: String,
    /// First night of the stay
    pub check_in: NaiveDate,
    /// Departure date (exclusive)
    pub check_out: NaiveDate,
    /// Whether the booking was cancelled
    pub cancelled: bool,
    pub total_amount: Option<BigDecimal>,
    pub tax_amount: Option<BigDecimal>,
    pub host_service_fee: Option<BigDecimal>,
    pub accommodation_fare: Option<BigDecimal>,
    pub cleaning_fee: Option<BigDecimal>,
    pub deposit_received: Option<BigDecimal>,
    /// Booking channel the record came from
    pub source: String,
}

/// One full page of provider records, fetched before any merge begins
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalBatch {
    pub properties: Vec<ExternalProperty>,
    pub reservations: Vec<ExternalReservation>,
}

/// Supplies normalized booking records page by page
///
/// Implementations own timeouts and cancellation; the reconciler never
/// merges a page it did not receive whole.
#[async_trait]
pub trait BookingProvider: Send + Sync {
    /// Fetch the given zero-based page, or `None` when pagination is done
    async fn fetch_page(&self, page: usize) -> TrustResult<Option<ExternalBatch>>;
}

/// Created/updated counters for one merge or sync run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub properties_created: usize,
    pub properties_updated: usize,
    pub reservations_created: usize,
    pub reservations_updated: usize,
}

impl SyncReport {
    pub fn total_created(&self) -> usize {
        self.properties_created + self.reservations_created
    }

    pub fn total_updated(&self) -> usize {
        self.properties_updated + self.reservations_updated
    }

    /// Fold another report into this one
    pub fn absorb(&mut self, other: &SyncReport) {
        self.properties_created += other.properties_created;
        self.properties_updated += other.properties_updated;
        self.reservations_created += other.reservations_created;
        self.reservations_updated += other.reservations_updated;
    }
}

impl std::fmt::Display for SyncReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} properties created, {} updated; {} reservations created, {} updated",
            self.properties_created,
            self.properties_updated,
            self.reservations_created,
            self.reservations_updated
        )
    }
}

/// Polled status of an in-flight sync run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncProgress {
    /// Pages fetched and merged so far
    pub pages_completed: usize,
    /// Records examined across all merged pages
    pub records_seen: usize,
    /// Counters accumulated from committed pages
    pub report: SyncReport,
    /// Whether the run has finished (successfully or not)
    pub finished: bool,
}

/// Merges externally-sourced records into the local store
///
/// Records are keyed by their stable external identifier: listing id for
/// properties, confirmation code for reservations. Settlement flags and
/// fee overrides belong to this system, not the channel, and are never
/// touched by a merge. Re-running the same input is safe: the second run
/// creates nothing and updates nothing unless fields genuinely changed.
pub struct IngestionReconciler<S: TrustStorage> {
    storage: S,
    validator: Box<dyn RecordValidator>,
    progress: Arc<Mutex<SyncProgress>>,
}

impl<S: TrustStorage> IngestionReconciler<S> {
    /// Create a reconciler with the default record validator
    pub fn new(storage: S) -> Self {
        Self::with_validator(storage, Box::new(DefaultRecordValidator))
    }

    /// Create a reconciler with a custom record validator
    pub fn with_validator(storage: S, validator: Box<dyn RecordValidator>) -> Self {
        Self {
            storage,
            validator,
            progress: Arc::new(Mutex::new(SyncProgress::default())),
        }
    }

    /// Current progress of the in-flight (or most recent) sync run
    pub fn progress(&self) -> SyncProgress {
        self.progress.lock().unwrap().clone()
    }

    /// Merge one full batch of provider records
    ///
    /// Properties merge first so new reservations can link to them. Each
    /// entity-type batch is validated in full before it is applied, and
    /// applies atomically; a validation failure leaves the current batch
    /// entirely unwritten.
    pub async fn merge(
        &mut self,
        batch: &ExternalBatch,
        config: &TrustConfig,
    ) -> TrustResult<SyncReport> {
        let mut report = SyncReport::default();

        let (property_writes, created, updated) = self.plan_property_writes(batch).await?;
        report.properties_created = created;
        report.properties_updated = updated;
        if !property_writes.is_empty() {
            self.storage.apply_batch(property_writes).await?;
        }

        let (reservation_writes, created, updated) =
            self.plan_reservation_writes(batch, config).await?;
        report.reservations_created = created;
        report.reservations_updated = updated;
        if !reservation_writes.is_empty() {
            self.storage.apply_batch(reservation_writes).await?;
        }

        tracing::debug!(%report, "merged external batch");
        Ok(report)
    }

    /// Pull every page from a provider and merge each one
    ///
    /// A failure, whether from the provider or the merge, aborts at the
    /// current page and surfaces as [`TrustError::Sync`] carrying the
    /// counters from pages already committed; those pages stay merged.
    pub async fn sync_from(
        &mut self,
        provider: &dyn BookingProvider,
        config: &TrustConfig,
    ) -> TrustResult<SyncReport> {
        {
            let mut progress = self.progress.lock().unwrap();
            *progress = SyncProgress::default();
        }

        let mut report = SyncReport::default();
        let mut page = 0;

        loop {
            let fetched = match provider.fetch_page(page).await {
                Ok(fetched) => fetched,
                Err(e) => {
                    self.progress.lock().unwrap().finished = true;
                    return Err(TrustError::Sync {
                        message: e.to_string(),
                        report,
                    });
                }
            };

            let Some(batch) = fetched else {
                break;
            };

            let page_report = match self.merge(&batch, config).await {
                Ok(page_report) => page_report,
                Err(e) => {
                    self.progress.lock().unwrap().finished = true;
                    return Err(TrustError::Sync {
                        message: e.to_string(),
                        report,
                    });
                }
            };
            report.absorb(&page_report);

            let mut progress = self.progress.lock().unwrap();
            progress.pages_completed += 1;
            progress.records_seen += batch.properties.len() + batch.reservations.len();
            progress.report = report;
            drop(progress);

            page += 1;
        }

        self.progress.lock().unwrap().finished = true;
        tracing::info!(%report, pages = page, "sync finished");
        Ok(report)
    }

    async fn plan_property_writes(
        &self,
        batch: &ExternalBatch,
    ) -> TrustResult<(WriteBatch, usize, usize)> {
        let now = chrono::Utc::now().naive_utc();
        let mut writes = WriteBatch::new();
        let mut created = 0;
        let mut updated = 0;
        let mut candidates = Vec::new();

        for incoming in &batch.properties {
            match self
                .storage
                .find_property_by_listing(&incoming.external_listing_id)
                .await?
            {
                Some(existing) => {
                    // Only channel-owned fields move; fee override, owner
                    // link, and jurisdiction stay local.
                    let mut next = existing.clone();
                    next.name = incoming.name.clone();
                    next.address = incoming.address.clone();
                    next.active = incoming.active;

                    if next != existing {
                        next.updated_at = now;
                        candidates.push(next);
                        updated += 1;
                    }
                }
                None => {
                    let mut property = Property::new(
                        Uuid::new_v4().to_string(),
                        incoming.name.clone(),
                        incoming.external_listing_id.clone(),
                    );
                    property.address = incoming.address.clone();
                    property.active = incoming.active;
                    candidates.push(property);
                    created += 1;
                }
            }
        }

        for property in &candidates {
            self.validator.validate_property(property)?;
        }
        for property in candidates {
            writes.put_property(property);
        }

        Ok((writes, created, updated))
    }

    async fn plan_reservation_writes(
        &self,
        batch: &ExternalBatch,
        config: &TrustConfig,
    ) -> TrustResult<(WriteBatch, usize, usize)> {
        let now = chrono::Utc::now().naive_utc();
        let mut writes = WriteBatch::new();
        let mut created = 0;
        let mut updated = 0;
        let mut candidates = Vec::new();

        for incoming in &batch.reservations {
            let property = match &incoming.external_listing_id {
                Some(listing_id) => self.storage.find_property_by_listing(listing_id).await?,
                None => None,
            };
            let owner = match property.as_ref().and_then(|p| p.owner_id.as_ref()) {
                Some(owner_id) => self.storage.get_owner(owner_id).await?,
                None => None,
            };

            match self
                .storage
                .find_reservation_by_confirmation(&incoming.confirmation_code)
                .await?
            {
                Some(existing) => {
                    let mut next = existing.clone();
                    apply_external_fields(&mut next, incoming, property.as_ref().map(|p| &p.id));
                    ReservationFinancialCalculator::refresh_cached_split(
                        &mut next,
                        property.as_ref(),
                        owner.as_ref(),
                        config,
                    );

                    if next != existing {
                        next.updated_at = now;
                        candidates.push(next);
                        updated += 1;
                    }
                }
                None => {
                    let mut reservation = Reservation::new(
                        Uuid::new_v4().to_string(),
                        incoming.confirmation_code.clone(),
                        incoming.check_in,
                        incoming.check_out,
                    );
                    apply_external_fields(
                        &mut reservation,
                        incoming,
                        property.as_ref().map(|p| &p.id),
                    );
                    ReservationFinancialCalculator::refresh_cached_split(
                        &mut reservation,
                        property.as_ref(),
                        owner.as_ref(),
                        config,
                    );
                    candidates.push(reservation);
                    created += 1;
                }
            }
        }

        for reservation in &candidates {
            self.validator.validate_reservation(reservation)?;
        }
        for reservation in candidates {
            writes.put_reservation(reservation);
        }

        Ok((writes, created, updated))
    }
}

/// Absent monetary field defaults to zero
fn amount_or_zero(amount: &Option<BigDecimal>) -> BigDecimal {
    amount.clone().unwrap_or_else(|| BigDecimal::from(0))
}

/// Copy channel-owned fields onto a reservation; settlement flags are not
/// channel-owned and are left alone
fn apply_external_fields(
    reservation: &mut Reservation,
    incoming: &ExternalReservation,
    property_id: Option<&String>,
) {
    if let Some(id) = property_id {
        reservation.property_id = Some(id.clone());
    }
    reservation.guest_name = incoming.guest_name.clone();
    reservation.check_in = incoming.check_in;
    reservation.check_out = incoming.check_out;
    reservation.cancelled = incoming.cancelled;
    reservation.total_amount = amount_or_zero(&incoming.total_amount);
    reservation.tax_amount = amount_or_zero(&incoming.tax_amount);
    reservation.host_service_fee = amount_or_zero(&incoming.host_service_fee);
    reservation.accommodation_fare = amount_or_zero(&incoming.accommodation_fare);
    reservation.cleaning_fee = amount_or_zero(&incoming.cleaning_fee);
    reservation.deposit_received = amount_or_zero(&incoming.deposit_received);
    reservation.source = incoming.source.clone();
}
