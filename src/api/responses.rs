use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::*;

#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub balance: Decimal,
    pub invite_code: InviteCode,
}
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: UserResponse,
    pub session_token: SessionToken,
}
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    pub market_id: MarketId,
    pub position: Outcome,
    pub amount: Decimal,
    pub potential_payout: Decimal,
}
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
pub struct InviteValidationResponse {
    pub valid: bool,
}
