use crate::api::*;
use crate::db::DB;
use chrono::{DateTime, Utc};
use log::{debug, error, info};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// Rounding slack allowed when checking that a settlement pays out no more
/// than the pool holds.
const PAYOUT_EPSILON: Decimal = dec!(0.000001);

pub struct MarketEngine {
    db: Arc<DB>,
}

impl MarketEngine {
    pub fn new(db: Arc<DB>) -> Self {
        Self { db }
    }

    pub fn create_market(
        &self,
        question: String,
        description: String,
        close_date: Option<DateTime<Utc>>,
        creator: &UserId,
    ) -> Result<Market, MarketError> {
        let mut tables = self.db.transaction();
        if tables.user(creator).is_none() {
            return Err(MarketError::NotFound(format!("User {}", creator)));
        }
        let market = Market {
            id: Uuid::new_v4(),
            question,
            description,
            created_by: *creator,
            created_at: Utc::now(),
            close_date,
            status: MarketStatus::Open,
            resolution: None,
            resolved_at: None,
            yes_pool: Decimal::ZERO,
            no_pool: Decimal::ZERO,
        };
        tables.insert_market(market.clone());
        debug!("Created market {}: {}", market.id, market.question);
        Ok(market)
    }

    pub fn place_bet(
        &self,
        market: &MarketId,
        position: &str,
        amount: Decimal,
        user: &UserId,
    ) -> Result<Bet, MarketError> {
        self.place_bet_at(market, position, amount, user, Utc::now())
    }

    fn place_bet_at(
        &self,
        market_id: &MarketId,
        position: &str,
        amount: Decimal,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Bet, MarketError> {
        let position =
            Outcome::from_str(position).map_err(BetRejection::InvalidPosition)?;
        if amount <= Decimal::ZERO {
            return Err(BetRejection::NonPositiveAmount.into());
        }

        let mut tables = self.db.transaction();
        let market = tables
            .market_mut(market_id)
            .ok_or_else(|| MarketError::NotFound(format!("Market {}", market_id)))?;
        match market.status {
            MarketStatus::Open if market.is_expired(now) => {
                market.status = MarketStatus::Closed;
                debug!(
                    "Closed market {} because someone tried betting after its close date",
                    market_id
                );
                return Err(BetRejection::MarketNotOpen.into());
            }
            MarketStatus::Open => {}
            _ => return Err(BetRejection::MarketNotOpen.into()),
        }
        let (yes_pool, no_pool) = (market.yes_pool, market.no_pool);

        let user = tables
            .user(user_id)
            .ok_or_else(|| MarketError::NotFound(format!("User {}", user_id)))?;
        if user.balance < amount {
            return Err(BetRejection::InsufficientBalance.into());
        }
        let potential_payout = Self::potential_payout(yes_pool, no_pool, position, amount)
            .ok_or(BetRejection::AmountTooLarge)?;

        let bet = Bet {
            id: Uuid::new_v4(),
            market_id: *market_id,
            user_id: *user_id,
            position,
            amount,
            potential_payout,
            placed_at: now,
            status: BetStatus::Active,
            payout: None,
        };
        // Every precondition holds under this lock, nothing below can fail
        // once the bet row is in.
        tables.insert_bet(bet.clone())?;
        if let Some(user) = tables.user_mut(user_id) {
            user.balance -= amount;
        }
        if let Some(market) = tables.market_mut(market_id) {
            match position {
                Outcome::Yes => market.yes_pool += amount,
                Outcome::No => market.no_pool += amount,
            }
        }
        debug!(
            "User {} bet {} on {} in market {} (potential payout {})",
            user_id, amount, position, market_id, potential_payout
        );
        Ok(bet)
    }

    pub fn resolve_market(
        &self,
        market_id: &MarketId,
        resolution: &str,
        caller: &UserId,
    ) -> Result<Settlement, MarketError> {
        let mut tables = self.db.transaction();
        let market = tables
            .market(market_id)
            .ok_or_else(|| MarketError::NotFound(format!("Market {}", market_id)))?;
        if market.created_by != *caller {
            return Err(MarketError::Forbidden);
        }
        if market.status == MarketStatus::Resolved {
            return Err(MarketError::AlreadyResolved);
        }
        let resolution = Outcome::from_str(resolution).map_err(MarketError::InvalidResolution)?;

        if market.yes_pool < Decimal::ZERO || market.no_pool < Decimal::ZERO {
            error!(
                "Market {} has a negative pool (yes {}, no {})",
                market_id, market.yes_pool, market.no_pool
            );
            return Err(MarketError::InvariantViolated(format!(
                "negative pool in market {}",
                market_id
            )));
        }
        let total_pool = market.total_pool();
        let winning_pool = market.pool(resolution);
        let (yes_pool, no_pool) = (market.yes_pool, market.no_pool);

        // Work out every payout before touching anything so a broken
        // invariant leaves the market as it was.
        let mut payouts = Vec::new();
        let (mut staked_yes, mut staked_no) = (Decimal::ZERO, Decimal::ZERO);
        for id in tables.market_bet_ids(market_id) {
            let bet = tables.bet(&id).ok_or_else(|| {
                MarketError::InvariantViolated(format!("bet {} is indexed but missing", id))
            })?;
            match bet.position {
                Outcome::Yes => staked_yes += bet.amount,
                Outcome::No => staked_no += bet.amount,
            }
            let won = bet.position == resolution && !winning_pool.is_zero();
            let payout = Self::settlement_payout(
                bet.amount,
                bet.position,
                resolution,
                winning_pool,
                total_pool,
            )
            .ok_or_else(|| {
                error!("Payout of bet {} in market {} overflows", id, market_id);
                MarketError::InvariantViolated(format!("payout of bet {} overflows", id))
            })?;
            payouts.push((id, bet.user_id, won, payout));
        }
        let total_paid = payouts
            .iter()
            .try_fold(Decimal::ZERO, |sum, (_, _, _, payout)| sum.checked_add(*payout))
            .ok_or_else(|| {
                error!("Total payout of market {} overflows", market_id);
                MarketError::InvariantViolated(format!("payouts of market {} overflow", market_id))
            })?;
        if staked_yes != yes_pool || staked_no != no_pool {
            error!(
                "Pools of market {} (yes {}, no {}) don't match its bets (yes {}, no {})",
                market_id, yes_pool, no_pool, staked_yes, staked_no
            );
            return Err(MarketError::InvariantViolated(format!(
                "pools of market {} don't match its bets",
                market_id
            )));
        }
        if total_paid > total_pool.saturating_add(PAYOUT_EPSILON) {
            error!(
                "Settling market {} would pay out {} from a pool of {}",
                market_id, total_paid, total_pool
            );
            return Err(MarketError::InvariantViolated(format!(
                "market {} would be insolvent",
                market_id
            )));
        }

        let now = Utc::now();
        let market = match tables.market_mut(market_id) {
            Some(market) => {
                market.status = MarketStatus::Resolved;
                market.resolution = Some(resolution);
                market.resolved_at = Some(now);
                market.clone()
            }
            None => return Err(MarketError::NotFound(format!("Market {}", market_id))),
        };
        let mut winning_bets = 0;
        for (id, user_id, won, payout) in payouts.iter() {
            if let Some(bet) = tables.bet_mut(id) {
                bet.status = if *won { BetStatus::Won } else { BetStatus::Lost };
                bet.payout = Some(*payout);
            }
            if *won {
                winning_bets += 1;
                if let Some(user) = tables.user_mut(user_id) {
                    user.balance += *payout;
                }
            }
        }
        if winning_pool.is_zero() && !payouts.is_empty() {
            info!(
                "Nobody bet on {} in market {}, no payouts",
                resolution, market_id
            );
        }
        info!(
            "Resolved market {} as {}: {} bets settled, {} paid out",
            market_id,
            resolution,
            payouts.len(),
            total_paid
        );
        Ok(Settlement {
            market,
            bets_settled: payouts.len(),
            winning_bets,
            total_paid,
        })
    }

    /// Moves every open market whose close date has passed to `Closed`.
    pub fn close_expired_markets(&self, now: DateTime<Utc>) -> Vec<MarketId> {
        let mut tables = self.db.transaction();
        let mut closed = Vec::new();
        for id in tables.market_ids() {
            if let Some(market) = tables.market_mut(&id) {
                if market.status == MarketStatus::Open && market.is_expired(now) {
                    market.status = MarketStatus::Closed;
                    closed.push(id);
                }
            }
        }
        if !closed.is_empty() {
            debug!("Closed {} markets past their close date", closed.len());
        }
        closed
    }

    pub fn get_all_markets(&self) -> Vec<Market> {
        self.db.read().markets_newest_first().cloned().collect()
    }

    pub fn get_market(&self, market: &MarketId) -> Result<Market, MarketError> {
        self.db
            .read()
            .market(market)
            .cloned()
            .ok_or_else(|| MarketError::NotFound(format!("Market {}", market)))
    }

    pub fn get_market_bets(&self, market: &MarketId) -> Result<Vec<Bet>, MarketError> {
        let tables = self.db.read();
        if tables.market(market).is_none() {
            return Err(MarketError::NotFound(format!("Market {}", market)));
        }
        Ok(tables.market_bets_newest_first(market))
    }

    pub fn get_user_bets(&self, user: &UserId) -> Vec<Bet> {
        self.db.read().user_bets_newest_first(user)
    }

    /// What a bet would be told as its potential payout if it were placed
    /// right now.
    pub fn quote(
        &self,
        market_id: &MarketId,
        position: &str,
        amount: Decimal,
    ) -> Result<QuoteResponse, MarketError> {
        let position =
            Outcome::from_str(position).map_err(BetRejection::InvalidPosition)?;
        if amount <= Decimal::ZERO {
            return Err(BetRejection::NonPositiveAmount.into());
        }
        let market = self.get_market(market_id)?;
        let potential_payout =
            Self::potential_payout(market.yes_pool, market.no_pool, position, amount)
                .ok_or(BetRejection::AmountTooLarge)?;
        Ok(QuoteResponse {
            market_id: *market_id,
            position,
            amount,
            potential_payout,
        })
    }

    /// Pari-mutuel estimate at placement time: the share of the grown total
    /// pool this stake would own on its side if nothing else changed.
    /// `None` if the numbers don't fit a `Decimal`.
    pub fn potential_payout(
        yes_pool: Decimal,
        no_pool: Decimal,
        position: Outcome,
        amount: Decimal,
    ) -> Option<Decimal> {
        let total_pool = yes_pool.checked_add(no_pool)?.checked_add(amount)?;
        let position_pool = match position {
            Outcome::Yes => yes_pool,
            Outcome::No => no_pool,
        }
        .checked_add(amount)?;
        if position_pool.is_zero() {
            return Some(Decimal::ZERO);
        }
        total_pool.checked_mul(amount)?.checked_div(position_pool)
    }

    /// Final payout of one bet. Losing bets get nothing and so does
    /// everybody when the winning side holds no stake.
    pub fn settlement_payout(
        amount: Decimal,
        position: Outcome,
        resolution: Outcome,
        winning_pool: Decimal,
        total_pool: Decimal,
    ) -> Option<Decimal> {
        if position != resolution || winning_pool.is_zero() {
            return Some(Decimal::ZERO);
        }
        amount.checked_mul(total_pool)?.checked_div(winning_pool)
    }
}
