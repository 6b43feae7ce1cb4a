use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::*;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub invite_code: InviteCode,
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateMarketRequest {
    pub question: String,
    pub description: String,
    #[serde(default)]
    pub close_date: Option<DateTime<Utc>>,
}
impl CreateMarketRequest {
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), MarketError> {
        if self.question.trim().is_empty() {
            return Err(MarketError::InvalidInput("question must not be empty".into()));
        }
        if self.description.trim().is_empty() {
            return Err(MarketError::InvalidInput(
                "description must not be empty".into(),
            ));
        }
        if let Some(close_date) = self.close_date {
            if close_date <= now {
                return Err(MarketError::InvalidInput(format!(
                    "close date {} is not in the future",
                    close_date
                )));
            }
        }
        Ok(())
    }
}
/// Position and resolution stay plain strings on the wire so that a bad
/// literal is rejected by the engine with a proper error instead of a
/// deserialization failure.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlaceBetRequest {
    pub market_id: MarketId,
    pub position: String,
    pub amount: Decimal,
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResolveMarketRequest {
    pub resolution: String,
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub position: String,
    pub amount: Decimal,
}
