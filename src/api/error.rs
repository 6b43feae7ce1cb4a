use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum MarketError {
    #[error("Missing or invalid session token")]
    Unauthenticated,
    #[error("{0} not found")]
    NotFound(String),
    #[error("Cannot place bet: {0}")]
    InvalidBet(BetRejection),
    #[error("Only the creator of a market can resolve it")]
    Forbidden,
    #[error("The market is already resolved")]
    AlreadyResolved,
    #[error("'{0}' is not a valid resolution, expected YES or NO")]
    InvalidResolution(String),
    #[error("Invalid invite code")]
    InvalidInviteCode,
    #[error("An account with this email already exists")]
    EmailTaken,
    #[error("Wrong email or password")]
    InvalidCredentials,
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Ledger invariant violated: {0}")]
    InvariantViolated(String),
}

#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum BetRejection {
    #[error("the market is not open for betting")]
    MarketNotOpen,
    #[error("insufficient balance")]
    InsufficientBalance,
    #[error("the amount has to be positive")]
    NonPositiveAmount,
    #[error("the amount is too large")]
    AmountTooLarge,
    #[error("'{0}' is not a valid position, expected YES or NO")]
    InvalidPosition(String),
}

impl From<BetRejection> for MarketError {
    fn from(e: BetRejection) -> Self {
        Self::InvalidBet(e)
    }
}
