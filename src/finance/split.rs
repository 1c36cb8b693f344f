//! Derivation of a booking's net revenue, management fee, and owner payout

use bigdecimal::{BigDecimal, RoundingMode};
use serde::{Deserialize, Serialize};

use crate::finance::fees::FeeResolver;
use crate::types::{Owner, Property, Reservation, TrustConfig};

/// Financial split of one booking
///
/// `owner_payout + management_fee == net_revenue` holds exactly for any fee
/// percent, because the payout is derived by subtraction after the fee is
/// rounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialSplit {
    /// total − tax − host service fee
    pub net_revenue: BigDecimal,
    /// Share retained by the management company, rounded half-up to cents
    pub management_fee: BigDecimal,
    /// Share owed to the owner
    pub owner_payout: BigDecimal,
}

/// Derives the financial split for one booking
///
/// A pure function of the reservation's current raw monetary fields. The
/// cached `management_fee` / `owner_payout` on [`Reservation`] are display
/// copies; every aggregate in this crate recomputes through here.
pub struct ReservationFinancialCalculator;

impl ReservationFinancialCalculator {
    /// Compute the split for an already-resolved fee percent
    ///
    /// Net revenue is deliberately not clamped at zero: when tax plus the
    /// host service fee exceed the total, the negative payout is surfaced
    /// so reconciliation shows the anomaly instead of hiding it.
    pub fn compute(reservation: &Reservation, fee_percent: &BigDecimal) -> FinancialSplit {
        let net_revenue = &reservation.total_amount
            - &reservation.tax_amount
            - &reservation.host_service_fee;

        let management_fee = ((&net_revenue * fee_percent) / BigDecimal::from(100))
            .with_scale_round(2, RoundingMode::HalfUp);
        let owner_payout = &net_revenue - &management_fee;

        FinancialSplit {
            net_revenue,
            management_fee,
            owner_payout,
        }
    }

    /// Compute the split, resolving the fee through [`FeeResolver`] first
    pub fn compute_for(
        reservation: &Reservation,
        property: Option<&Property>,
        owner: Option<&Owner>,
        config: &TrustConfig,
    ) -> FinancialSplit {
        let fee_percent = FeeResolver::resolve(property, owner, &config.default_fee_percent);
        Self::compute(reservation, &fee_percent)
    }

    /// Recompute and store the cached derived fields on a reservation
    pub fn refresh_cached_split(
        reservation: &mut Reservation,
        property: Option<&Property>,
        owner: Option<&Owner>,
        config: &TrustConfig,
    ) {
        let split = Self::compute_for(reservation, property, owner, config);
        reservation.management_fee = split.management_fee;
        reservation.owner_payout = split.owner_payout;
    }
}
