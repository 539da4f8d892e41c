//! Ledger error kinds.
//!
//! Every error is a caller input or permission failure and guarantees that
//! no state was mutated.

use crate::core::types::PlantId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("plant {0} not found")]
    NotFound(PlantId),

    #[error("caller is not the owner of this plant")]
    NotOwner,

    #[error("plant name must not be empty")]
    EmptyName,

    #[error("plant species must not be empty")]
    EmptySpecies,

    #[error("soil moisture {0} is out of range (0-100)")]
    InvalidMoisture(u16),

    #[error("humidity {0} is out of range (0-100)")]
    InvalidHumidity(u16),

    #[error("pH {0} is out of range (400-1000)")]
    InvalidPh(u16),

    #[error("new owner must not be the null identity")]
    InvalidOwner,

    #[error("cannot transfer a plant to its current owner")]
    SelfTransfer,

    #[error("plant {0} is dormant and does not accept readings")]
    Dormant(PlantId),
}

impl LedgerError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::NotFound(_) => "NOT_FOUND",
            LedgerError::NotOwner => "NOT_OWNER",
            LedgerError::EmptyName => "EMPTY_NAME",
            LedgerError::EmptySpecies => "EMPTY_SPECIES",
            LedgerError::InvalidMoisture(_) => "INVALID_MOISTURE",
            LedgerError::InvalidHumidity(_) => "INVALID_HUMIDITY",
            LedgerError::InvalidPh(_) => "INVALID_PH",
            LedgerError::InvalidOwner => "INVALID_OWNER",
            LedgerError::SelfTransfer => "SELF_TRANSFER",
            LedgerError::Dormant(_) => "DORMANT",
        }
    }

    /// Whether this error came from reading validation.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LedgerError::InvalidMoisture(_) | LedgerError::InvalidHumidity(_) | LedgerError::InvalidPh(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_code() {
        let err = LedgerError::NotFound(PlantId(9));
        assert_eq!(err.to_string(), "plant 9 not found");
        assert_eq!(err.code(), "NOT_FOUND");
        assert_eq!(LedgerError::InvalidPh(1200).code(), "INVALID_PH");
    }

    #[test]
    fn test_is_validation() {
        assert!(LedgerError::InvalidHumidity(120).is_validation());
        assert_eq!(
            LedgerError::InvalidMoisture(300).to_string(),
            "soil moisture 300 is out of range (0-100)"
        );
        assert!(!LedgerError::NotOwner.is_validation());
    }
}
