//! Validation utilities

use bigdecimal::BigDecimal;

use crate::types::*;

/// Validate that a monetary amount is not negative
pub fn validate_non_negative(
    entity: &'static str,
    id: &str,
    field: &str,
    amount: &BigDecimal,
) -> TrustResult<()> {
    if *amount < BigDecimal::from(0) {
        return Err(TrustError::Validation {
            entity,
            id: id.to_string(),
            message: format!("{} cannot be negative: {}", field, amount),
        });
    }
    Ok(())
}

/// Validate that a fee percent lies within [0, 100]
pub fn validate_fee_percent(
    entity: &'static str,
    id: &str,
    percent: &BigDecimal,
) -> TrustResult<()> {
    if *percent < BigDecimal::from(0) || *percent > BigDecimal::from(100) {
        return Err(TrustError::Validation {
            entity,
            id: id.to_string(),
            message: format!("fee percent must be within [0, 100]: {}", percent),
        });
    }
    Ok(())
}

/// Validate that an identifier field is present and non-blank
pub fn validate_required_id(entity: &'static str, value: &str, field: &str) -> TrustResult<()> {
    if value.trim().is_empty() {
        return Err(TrustError::Validation {
            entity,
            id: value.to_string(),
            message: format!("{} cannot be empty", field),
        });
    }
    Ok(())
}

/// Validate that a reservation's stay window is ordered
pub fn validate_stay_dates(reservation: &Reservation) -> TrustResult<()> {
    if reservation.check_out < reservation.check_in {
        return Err(TrustError::Validation {
            entity: "Reservation",
            id: reservation.id.clone(),
            message: format!(
                "check_out {} precedes check_in {}",
                reservation.check_out, reservation.check_in
            ),
        });
    }
    Ok(())
}
