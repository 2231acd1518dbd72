use bigdecimal::BigDecimal;
use std::fmt;

use crate::domain::{NewTransaction, Proof};

pub const OWNER_ID_MAX_LEN: usize = 128;
pub const ADDRESS_MAX_LEN: usize = 128;
pub const TOKEN_MAX_LEN: usize = 16;
pub const REFERENCE_MAX_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.len() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

pub fn validate_token(token: &str) -> ValidationResult {
    validate_required("token", token)?;
    validate_max_len("token", token, TOKEN_MAX_LEN)?;

    if !token.chars().all(|ch| ch.is_ascii_alphanumeric()) {
        return Err(ValidationError::new(
            "token",
            "must contain only letters and digits",
        ));
    }

    Ok(())
}

pub fn validate_positive_amount(amount: &BigDecimal) -> ValidationResult {
    if amount <= &BigDecimal::from(0) {
        return Err(ValidationError::new("amount", "must be greater than zero"));
    }

    Ok(())
}

/// A pending or confirmed record needs something to identify it on-chain.
/// Only failed submissions may arrive without a reference.
pub fn validate_reference(reference: Option<&str>, proof: Proof) -> ValidationResult {
    match reference {
        Some(reference) => {
            validate_required("reference", reference)?;
            validate_max_len("reference", reference, REFERENCE_MAX_LEN)
        }
        None if proof == Proof::Failed => Ok(()),
        None => Err(ValidationError::new(
            "reference",
            "is required unless the submission failed; use a synthetic reference when the network returns none",
        )),
    }
}

pub fn validate_new_transaction(tx: &NewTransaction) -> ValidationResult {
    validate_required("owner_id", &tx.owner_id)?;
    validate_max_len("owner_id", &tx.owner_id, OWNER_ID_MAX_LEN)?;
    validate_required("counterparty_address", &tx.counterparty_address)?;
    validate_max_len(
        "counterparty_address",
        &tx.counterparty_address,
        ADDRESS_MAX_LEN,
    )?;
    validate_positive_amount(&tx.amount)?;
    validate_token(&tx.token)?;
    validate_reference(tx.reference.as_deref(), tx.proof)?;

    Ok(())
}
