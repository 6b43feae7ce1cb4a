use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = Uuid;
pub type MarketId = Uuid;
pub type BetId = Uuid;
pub type SessionToken = String;
pub type InviteCode = String;

/// Side of a binary market. Used both for a bet's position and for the
/// resolution of a market.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Yes,
    No,
}
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MarketStatus {
    Open,
    Closed,
    Resolved,
}
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BetStatus {
    Active,
    Won,
    Lost,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub balance: Decimal,
    pub invite_code: InviteCode,
    /// Invite code this user registered with.
    pub invited_by: Option<InviteCode>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Market {
    pub id: MarketId,
    pub question: String,
    pub description: String,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub close_date: Option<DateTime<Utc>>,
    pub status: MarketStatus,
    pub resolution: Option<Outcome>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub yes_pool: Decimal,
    pub no_pool: Decimal,
}
impl Market {
    pub fn pool(&self, side: Outcome) -> Decimal {
        match side {
            Outcome::Yes => self.yes_pool,
            Outcome::No => self.no_pool,
        }
    }
    pub fn total_pool(&self) -> Decimal {
        self.yes_pool + self.no_pool
    }
    /// True once the close date has been reached. Markets without a close
    /// date never expire.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.close_date.map_or(false, |close| close <= now)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bet {
    pub id: BetId,
    pub market_id: MarketId,
    pub user_id: UserId,
    pub position: Outcome,
    pub amount: Decimal,
    pub potential_payout: Decimal,
    pub placed_at: DateTime<Utc>,
    pub status: BetStatus,
    pub payout: Option<Decimal>,
}

/// Result of a single resolution sweep.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub market: Market,
    pub bets_settled: usize,
    pub winning_bets: usize,
    pub total_paid: Decimal,
}
