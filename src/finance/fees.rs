//! Effective management-fee resolution

use bigdecimal::BigDecimal;

use crate::types::{Owner, Property};

/// Resolves the effective management-fee percent for a booking
///
/// Precedence is total: a property override wins when present and strictly
/// greater than zero, then the owner default when present, then the global
/// default from configuration. Resolution is evaluated fresh on every call;
/// nothing is cached across edits to the property or owner.
pub struct FeeResolver;

impl FeeResolver {
    /// Resolve the effective fee percent
    ///
    /// `default_fee_percent` always comes from configuration, so resolution
    /// never fails.
    pub fn resolve(
        property: Option<&Property>,
        owner: Option<&Owner>,
        default_fee_percent: &BigDecimal,
    ) -> BigDecimal {
        if let Some(override_percent) = property.and_then(|p| p.fee_percent_override.as_ref()) {
            if *override_percent > BigDecimal::from(0) {
                return override_percent.clone();
            }
        }

        if let Some(owner_percent) = owner.and_then(|o| o.default_fee_percent.as_ref()) {
            return owner_percent.clone();
        }

        default_fee_percent.clone()
    }
}
