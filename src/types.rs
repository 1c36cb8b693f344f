//! Core types and data structures for the trust accounting system

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::sync::SyncReport;

/// A property owner the management company holds funds for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    /// Unique identifier for the owner
    pub id: String,
    /// Owner display name
    pub name: String,
    /// Contact email
    pub email: Option<String>,
    /// Owner-level management fee percent; the global default applies when absent
    pub default_fee_percent: Option<BigDecimal>,
    /// Date of the most recent payout run that settled this owner
    pub last_payout_date: Option<NaiveDate>,
    /// Soft-delete flag; owners are deactivated, never removed
    pub active: bool,
    /// When the owner was created
    pub created_at: NaiveDateTime,
    /// When the owner was last updated
    pub updated_at: NaiveDateTime,
}

impl Owner {
    /// Create a new active owner with no fee override
    pub fn new(id: String, name: String) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id,
            name,
            email: None,
            default_fee_percent: None,
            last_payout_date: None,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Postal address for a managed property
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub street: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
}

/// A managed short-term-rental property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    /// Unique identifier for the property
    pub id: String,
    /// Human-readable property name
    pub name: String,
    /// Postal address
    pub address: Address,
    /// Property-level management fee percent; wins over the owner default
    /// only when strictly greater than zero
    pub fee_percent_override: Option<BigDecimal>,
    /// Owning [`Owner`], resolved through storage (no object graph)
    pub owner_id: Option<String>,
    /// Stable listing identifier from the booking provider; the merge key
    /// for ingestion
    pub external_listing_id: String,
    /// Jurisdiction that occupancy tax for this property is remitted to
    pub tax_jurisdiction_id: Option<String>,
    /// Soft-delete flag
    pub active: bool,
    /// When the property was created
    pub created_at: NaiveDateTime,
    /// When the property was last updated
    pub updated_at: NaiveDateTime,
}

impl Property {
    /// Create a new active property keyed by its external listing id
    pub fn new(id: String, name: String, external_listing_id: String) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id,
            name,
            address: Address::default(),
            fee_percent_override: None,
            owner_id: None,
            external_listing_id,
            tax_jurisdiction_id: None,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A guest booking with its raw monetary fields and settlement state
///
/// `management_fee` and `owner_payout` are cached copies of the derived
/// split. They are refreshed when raw fields change but are never the
/// source of truth; aggregation always recomputes from the raw fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    /// Unique identifier for the reservation
    pub id: String,
    /// Property the stay belongs to, resolved through storage
    pub property_id: Option<String>,
    /// Primary guest name
    pub guest_name: String,
    /// First night of the stay
    pub check_in: NaiveDate,
    /// Departure date (exclusive)
    pub check_out: NaiveDate,
    /// Whether the booking was cancelled
    pub cancelled: bool,
    /// Gross amount charged to the guest
    pub total_amount: BigDecimal,
    /// Tax collected on the booking
    pub tax_amount: BigDecimal,
    /// Fee retained by the booking channel
    pub host_service_fee: BigDecimal,
    /// Nightly accommodation portion of the total
    pub accommodation_fare: BigDecimal,
    /// Cleaning fee portion of the total
    pub cleaning_fee: BigDecimal,
    /// Deposit already collected and held in trust
    pub deposit_received: BigDecimal,
    /// Booking confirmation code; the merge key for ingestion
    pub confirmation_code: String,
    /// Booking channel the reservation came from
    pub source: String,
    /// Whether the owner's share has been paid out
    pub owner_paid_out: bool,
    /// Date the owner payout was recorded
    pub owner_paid_out_date: Option<NaiveDate>,
    /// Whether the collected tax has been remitted
    pub tax_remitted: bool,
    /// Date the tax remittance was recorded
    pub tax_remitted_date: Option<NaiveDate>,
    /// Cached management fee (derived, not authoritative)
    pub management_fee: BigDecimal,
    /// Cached owner payout (derived, not authoritative)
    pub owner_payout: BigDecimal,
    /// When the reservation was created
    pub created_at: NaiveDateTime,
    /// When the reservation was last updated
    pub updated_at: NaiveDateTime,
}

impl Reservation {
    /// Create a new reservation with zeroed monetary fields
    pub fn new(
        id: String,
        confirmation_code: String,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Self {
        let now = chrono::Utc::now().naive_utc();
        let zero = BigDecimal::from(0);
        Self {
            id,
            property_id: None,
            guest_name: String::new(),
            check_in,
            check_out,
            cancelled: false,
            total_amount: zero.clone(),
            tax_amount: zero.clone(),
            host_service_fee: zero.clone(),
            accommodation_fare: zero.clone(),
            cleaning_fee: zero.clone(),
            deposit_received: zero.clone(),
            confirmation_code,
            source: String::new(),
            owner_paid_out: false,
            owner_paid_out_date: None,
            tax_remitted: false,
            tax_remitted_date: None,
            management_fee: zero.clone(),
            owner_payout: zero,
            created_at: now,
            updated_at: now,
        }
    }

    /// Stay has not started yet as of the given date
    pub fn is_future(&self, as_of: NaiveDate) -> bool {
        !self.cancelled && self.check_in > as_of
    }

    /// Guest is in-house as of the given date (check-out day exclusive)
    pub fn is_active(&self, as_of: NaiveDate) -> bool {
        !self.cancelled && self.check_in <= as_of && as_of < self.check_out
    }

    /// Stay has ended as of the given date
    pub fn is_completed(&self, as_of: NaiveDate) -> bool {
        !self.cancelled && self.check_out <= as_of
    }
}

/// Kind of tax a jurisdiction levies on bookings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaxType {
    /// Occupancy / lodging tax
    Occupancy,
    /// General sales tax
    Sales,
    /// Tourism or resort levy
    Tourism,
}

/// How often a jurisdiction expects remittance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RemittanceFrequency {
    Monthly,
    Quarterly,
    Annual,
}

/// A tax authority that collected booking taxes are remitted to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxJurisdiction {
    /// Unique identifier for the jurisdiction
    pub id: String,
    /// Jurisdiction display name
    pub name: String,
    /// Kind of tax levied
    pub tax_type: TaxType,
    /// Tax rate percent
    pub tax_rate: BigDecimal,
    /// Remittance cadence
    pub remittance_frequency: RemittanceFrequency,
    /// Day of the period the remittance is due
    pub remittance_due_day: u32,
    /// Date of the most recent remittance run
    pub last_remittance_date: Option<NaiveDate>,
    /// Soft-delete flag
    pub active: bool,
    /// When the jurisdiction was created
    pub created_at: NaiveDateTime,
    /// When the jurisdiction was last updated
    pub updated_at: NaiveDateTime,
}

impl TaxJurisdiction {
    /// Create a new active jurisdiction with a monthly cadence
    pub fn new(id: String, name: String, tax_type: TaxType, tax_rate: BigDecimal) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id,
            name,
            tax_type,
            tax_rate,
            remittance_frequency: RemittanceFrequency::Monthly,
            remittance_due_day: 20,
            last_remittance_date: None,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Point-in-time balance report from the payment processor
///
/// `available_balance` and `pending_balance` come from the processor;
/// `reserve_balance` is the manually entered holdback. `total_balance` is
/// always the sum of the three. The only permitted mutations after creation
/// are [`set_reserve`](Self::set_reserve), which re-derives the total, and
/// the back-link to the reconciliation snapshot that consumed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorBalanceSnapshot {
    /// Unique identifier for the snapshot
    pub id: String,
    /// Business date the balances were observed
    pub snapshot_date: NaiveDate,
    /// Funds available for payout
    pub available_balance: BigDecimal,
    /// Funds captured but not yet available
    pub pending_balance: BigDecimal,
    /// Manually entered processor holdback
    pub reserve_balance: BigDecimal,
    /// available + pending + reserve
    pub total_balance: BigDecimal,
    /// Reconciliation snapshot this balance fed into, if any
    pub reconciliation_snapshot_id: Option<String>,
    /// When the snapshot was recorded
    pub created_at: NaiveDateTime,
}

impl ProcessorBalanceSnapshot {
    /// Create a snapshot, rejecting any negative balance component
    pub fn new(
        id: String,
        snapshot_date: NaiveDate,
        available_balance: BigDecimal,
        pending_balance: BigDecimal,
        reserve_balance: BigDecimal,
    ) -> TrustResult<Self> {
        let zero = BigDecimal::from(0);
        for (field, amount) in [
            ("available_balance", &available_balance),
            ("pending_balance", &pending_balance),
            ("reserve_balance", &reserve_balance),
        ] {
            if *amount < zero {
                return Err(TrustError::Validation {
                    entity: "ProcessorBalanceSnapshot",
                    id: id.clone(),
                    message: format!("{} cannot be negative: {}", field, amount),
                });
            }
        }

        let total_balance = &available_balance + &pending_balance + &reserve_balance;
        Ok(Self {
            id,
            snapshot_date,
            available_balance,
            pending_balance,
            reserve_balance,
            total_balance,
            reconciliation_snapshot_id: None,
            created_at: chrono::Utc::now().naive_utc(),
        })
    }

    /// Build a snapshot from processor-reported integer minor units
    ///
    /// Providers report balances in cents; dividing by 100 here keeps the
    /// conversion in exact decimal arithmetic. The reserve starts at zero
    /// and is entered by an operator afterwards.
    pub fn from_minor_units(
        id: String,
        snapshot_date: NaiveDate,
        available_minor: i64,
        pending_minor: i64,
    ) -> TrustResult<Self> {
        let hundred = BigDecimal::from(100);
        Self::new(
            id,
            snapshot_date,
            BigDecimal::from(available_minor) / &hundred,
            BigDecimal::from(pending_minor) / &hundred,
            BigDecimal::from(0),
        )
    }

    /// Update the manually entered reserve and re-derive the total
    pub fn set_reserve(&mut self, reserve_balance: BigDecimal) -> TrustResult<()> {
        if reserve_balance < BigDecimal::from(0) {
            return Err(TrustError::Validation {
                entity: "ProcessorBalanceSnapshot",
                id: self.id.clone(),
                message: format!("reserve_balance cannot be negative: {}", reserve_balance),
            });
        }
        self.reserve_balance = reserve_balance;
        self.total_balance =
            &self.available_balance + &self.pending_balance + &self.reserve_balance;
        Ok(())
    }

    /// Funds the processor is withholding from operating access
    pub fn holdback(&self) -> BigDecimal {
        &self.pending_balance + &self.reserve_balance
    }
}

/// Outcome classification of a reconciliation snapshot
///
/// A given snapshot never changes status after creation; a new state means
/// a new snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SnapshotStatus {
    /// No processor balance was available; comparison is incomplete
    Draft,
    /// Variance within the configured threshold
    Balanced,
    /// Variance exceeded the threshold and needs investigation
    Variance,
}

/// Display metadata for a snapshot status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusMeta {
    pub label: &'static str,
    pub description: &'static str,
    pub requires_review: bool,
}

impl SnapshotStatus {
    /// Lookup-table display metadata for this status
    pub fn meta(&self) -> StatusMeta {
        match self {
            SnapshotStatus::Draft => StatusMeta {
                label: "Draft",
                description: "No processor balance available; expected side only",
                requires_review: true,
            },
            SnapshotStatus::Balanced => StatusMeta {
                label: "Balanced",
                description: "Actual balance matches expected within threshold",
                requires_review: false,
            },
            SnapshotStatus::Variance => StatusMeta {
                label: "Variance",
                description: "Actual balance differs from expected beyond threshold",
                requires_review: true,
            },
        }
    }

    pub fn label(&self) -> &'static str {
        self.meta().label
    }
}

/// One booking captured inside a reconciliation snapshot's audit payload
///
/// `amount` is a [`BigDecimal`] and serializes as a decimal string; `date`
/// serializes as ISO-8601.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLineItem {
    /// Reservation id the line refers to
    pub id: String,
    /// Primary display identifier (confirmation code)
    pub label: String,
    /// Secondary display identifier (guest or property name)
    pub secondary_label: Option<String>,
    /// Business date relevant to the line (check-in or check-out)
    pub date: NaiveDate,
    /// Monetary amount captured at snapshot time
    pub amount: BigDecimal,
}

/// Immutable point-in-time comparison of expected vs. actual trust balance
///
/// Snapshots are append-only audit records. A snapshot never changes after
/// creation; a correction is a new snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationSnapshot {
    /// Unique identifier for the snapshot
    pub id: String,
    /// Business date the reconciliation ran for
    pub reconciliation_date: NaiveDate,
    /// Outcome classification
    pub status: SnapshotStatus,
    /// Derived trust balance the account should hold
    pub expected_balance: BigDecimal,
    /// Processor-reported balance; absent when no processor snapshot existed
    pub actual_balance: Option<BigDecimal>,
    /// actual − expected; positive means the processor holds more than expected
    pub variance_amount: Option<BigDecimal>,
    /// Deposits held for stays not yet delivered
    pub future_deposits: BigDecimal,
    /// Processor pending + reserve at snapshot time
    pub processor_holdback: BigDecimal,
    /// Owner payouts owed but not yet settled
    pub unpaid_owner_payouts: BigDecimal,
    /// Collected tax not yet remitted
    pub unpaid_tax_amount: BigDecimal,
    /// Serialized [`AuditLineItem`] set: future-deposit bookings
    pub future_deposit_items: String,
    /// Serialized [`AuditLineItem`] set: unpaid-payout bookings
    pub unpaid_payout_items: String,
    /// Serialized [`AuditLineItem`] set: unpaid-tax bookings
    pub unpaid_tax_items: String,
    /// When the snapshot was created
    pub created_at: NaiveDateTime,
}

impl ReconciliationSnapshot {
    /// Deserialize one of the audit payloads back into line items
    pub fn parse_items(payload: &str) -> TrustResult<Vec<AuditLineItem>> {
        serde_json::from_str(payload)
            .map_err(|e| TrustError::Serialization(format!("audit payload: {}", e)))
    }
}

/// Process-wide configuration, passed explicitly into calculators
///
/// Replaces a get-or-create settings singleton: defaults are constructed
/// once via [`Default`] at process start and handed to each call site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustConfig {
    /// Management fee percent applied when neither property nor owner
    /// carries one
    pub default_fee_percent: BigDecimal,
    /// Absolute variance at or below which a reconciliation counts as balanced
    pub variance_threshold: BigDecimal,
    /// Days between reconciliation reminders
    pub reminder_interval_days: u32,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            default_fee_percent: BigDecimal::from(20),
            variance_threshold: BigDecimal::from(100),
            reminder_interval_days: 30,
        }
    }
}

/// Errors that can occur in the trust accounting core
#[derive(Debug, thiserror::Error)]
pub enum TrustError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("validation failed for {entity} '{id}': {message}")]
    Validation {
        entity: &'static str,
        id: String,
        message: String,
    },
    #[error("owner not found: {0}")]
    OwnerNotFound(String),
    #[error("property not found: {0}")]
    PropertyNotFound(String),
    #[error("reservation not found: {0}")]
    ReservationNotFound(String),
    #[error("tax jurisdiction not found: {0}")]
    JurisdictionNotFound(String),
    #[error("sync aborted ({report}): {message}")]
    Sync { message: String, report: SyncReport },
    #[error("concurrent settlement in progress for {0}")]
    ConcurrencyConflict(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type for trust accounting operations
pub type TrustResult<T> = Result<T, TrustError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn reservation_status_windows() {
        let r = Reservation::new(
            "r1".to_string(),
            "CONF-1".to_string(),
            date(2024, 6, 10),
            date(2024, 6, 14),
        );

        assert!(r.is_future(date(2024, 6, 9)));
        assert!(!r.is_future(date(2024, 6, 10)));

        assert!(r.is_active(date(2024, 6, 10)));
        assert!(r.is_active(date(2024, 6, 13)));
        assert!(!r.is_active(date(2024, 6, 14)));

        assert!(r.is_completed(date(2024, 6, 14)));
        assert!(!r.is_completed(date(2024, 6, 13)));
    }

    #[test]
    fn cancelled_reservation_has_no_status() {
        let mut r = Reservation::new(
            "r1".to_string(),
            "CONF-1".to_string(),
            date(2024, 6, 10),
            date(2024, 6, 14),
        );
        r.cancelled = true;

        assert!(!r.is_future(date(2024, 6, 1)));
        assert!(!r.is_active(date(2024, 6, 12)));
        assert!(!r.is_completed(date(2024, 7, 1)));
    }

    #[test]
    fn processor_snapshot_rejects_negative_balance() {
        let result = ProcessorBalanceSnapshot::new(
            "ps1".to_string(),
            date(2024, 6, 1),
            BigDecimal::from(100),
            BigDecimal::from(-1),
            BigDecimal::from(0),
        );
        assert!(matches!(result, Err(TrustError::Validation { .. })));
    }

    #[test]
    fn processor_snapshot_from_minor_units() {
        let snapshot = ProcessorBalanceSnapshot::from_minor_units(
            "ps1".to_string(),
            date(2024, 6, 1),
            123_456,
            7_890,
        )
        .unwrap();

        assert_eq!(
            snapshot.available_balance,
            "1234.56".parse::<BigDecimal>().unwrap()
        );
        assert_eq!(
            snapshot.pending_balance,
            "78.90".parse::<BigDecimal>().unwrap()
        );
        assert_eq!(
            snapshot.total_balance,
            "1313.46".parse::<BigDecimal>().unwrap()
        );
    }

    #[test]
    fn set_reserve_rederives_total() {
        let mut snapshot = ProcessorBalanceSnapshot::new(
            "ps1".to_string(),
            date(2024, 6, 1),
            BigDecimal::from(1000),
            BigDecimal::from(200),
            BigDecimal::from(0),
        )
        .unwrap();

        snapshot.set_reserve(BigDecimal::from(150)).unwrap();
        assert_eq!(snapshot.total_balance, BigDecimal::from(1350));
        assert_eq!(snapshot.holdback(), BigDecimal::from(350));

        assert!(snapshot.set_reserve(BigDecimal::from(-5)).is_err());
    }

    #[test]
    fn status_meta_lookup() {
        assert_eq!(SnapshotStatus::Balanced.label(), "Balanced");
        assert!(!SnapshotStatus::Balanced.meta().requires_review);
        assert!(SnapshotStatus::Variance.meta().requires_review);
        assert!(SnapshotStatus::Draft.meta().requires_review);
    }
}
