//! Expected trust balance aggregation

use std::collections::HashMap;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::finance::ReservationFinancialCalculator;
use crate::traits::TrustStorage;
use crate::types::*;

/// Derived expected trust balance with its audit line items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustBalance {
    /// Date the balance was derived for
    pub as_of: NaiveDate,
    /// Deposits held for stays not yet delivered
    pub future_deposits: BigDecimal,
    /// Processor pending + reserve from the latest balance snapshot
    pub processor_holdback: BigDecimal,
    /// Owner payouts owed on completed, unsettled bookings
    pub unpaid_owner_payouts: BigDecimal,
    /// Collected tax not yet remitted
    pub unpaid_tax_amount: BigDecimal,
    /// future_deposits − processor_holdback + unpaid_owner_payouts + unpaid_tax_amount
    pub expected_balance: BigDecimal,
    /// Bookings behind `future_deposits`
    pub future_deposit_items: Vec<AuditLineItem>,
    /// Bookings behind `unpaid_owner_payouts`
    pub unpaid_payout_items: Vec<AuditLineItem>,
    /// Bookings behind `unpaid_tax_amount`
    pub unpaid_tax_items: Vec<AuditLineItem>,
}

/// Aggregates bookings and the latest processor balance into the expected
/// trust balance
///
/// The expected balance is the money the business should be holding in
/// trust: deposits for stays not yet delivered, minus funds the processor
/// is already withholding from operating access, plus money owed out to
/// owners and tax authorities that has not yet left the account.
pub struct TrustBalanceCalculator<S: TrustStorage> {
    storage: S,
}

impl<S: TrustStorage> TrustBalanceCalculator<S> {
    /// Create a calculator over the given storage handle
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Derive the expected trust balance as of a date
    ///
    /// Owner payouts are recomputed from raw monetary fields through the
    /// fee precedence chain; the cached split on each reservation is never
    /// trusted here. An empty store yields an all-zero balance.
    pub async fn calculate_expected_balance(
        &self,
        as_of: NaiveDate,
        config: &TrustConfig,
    ) -> TrustResult<TrustBalance> {
        let reservations = self.storage.list_reservations().await?;

        // Id-keyed lookups so each reservation resolves its property and
        // owner without another storage round-trip.
        let properties: HashMap<String, Property> = self
            .storage
            .list_properties()
            .await?
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();
        let owners: HashMap<String, Owner> = self
            .storage
            .list_owners()
            .await?
            .into_iter()
            .map(|o| (o.id.clone(), o))
            .collect();

        let zero = BigDecimal::from(0);
        let mut future_deposits = zero.clone();
        let mut unpaid_owner_payouts = zero.clone();
        let mut unpaid_tax_amount = zero.clone();
        let mut future_deposit_items = Vec::new();
        let mut unpaid_payout_items = Vec::new();
        let mut unpaid_tax_items = Vec::new();

        for reservation in &reservations {
            let property = reservation
                .property_id
                .as_ref()
                .and_then(|id| properties.get(id));
            let owner = property
                .and_then(|p| p.owner_id.as_ref())
                .and_then(|id| owners.get(id));

            if reservation.is_future(as_of) {
                future_deposits += &reservation.deposit_received;
                future_deposit_items.push(AuditLineItem {
                    id: reservation.id.clone(),
                    label: reservation.confirmation_code.clone(),
                    secondary_label: Some(reservation.guest_name.clone()),
                    date: reservation.check_in,
                    amount: reservation.deposit_received.clone(),
                });
            }

            if reservation.is_completed(as_of) && !reservation.owner_paid_out {
                let split =
                    ReservationFinancialCalculator::compute_for(reservation, property, owner, config);
                unpaid_owner_payouts += &split.owner_payout;
                unpaid_payout_items.push(AuditLineItem {
                    id: reservation.id.clone(),
                    label: reservation.confirmation_code.clone(),
                    secondary_label: property.map(|p| p.name.clone()),
                    date: reservation.check_out,
                    amount: split.owner_payout,
                });
            }

            if reservation.is_completed(as_of)
                && !reservation.tax_remitted
                && reservation.tax_amount > zero
            {
                unpaid_tax_amount += &reservation.tax_amount;
                unpaid_tax_items.push(AuditLineItem {
                    id: reservation.id.clone(),
                    label: reservation.confirmation_code.clone(),
                    secondary_label: property.map(|p| p.name.clone()),
                    date: reservation.check_out,
                    amount: reservation.tax_amount.clone(),
                });
            }
        }

        let processor_holdback = match self.storage.latest_processor_snapshot().await? {
            Some(snapshot) => snapshot.holdback(),
            None => zero.clone(),
        };

        let expected_balance =
            &future_deposits - &processor_holdback + &unpaid_owner_payouts + &unpaid_tax_amount;

        tracing::debug!(
            %as_of,
            %expected_balance,
            reservations = reservations.len(),
            "derived expected trust balance"
        );

        Ok(TrustBalance {
            as_of,
            future_deposits,
            processor_holdback,
            unpaid_owner_payouts,
            unpaid_tax_amount,
            expected_balance,
            future_deposit_items,
            unpaid_payout_items,
            unpaid_tax_items,
        })
    }
}
