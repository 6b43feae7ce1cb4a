use crate::api::*;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::HashMap;

/// In-memory tables of the ledger together with their secondary indices.
///
/// The tables only guard referential integrity (a bet needs an existing
/// market and user) and email uniqueness. Everything else is up to the
/// engine, which works on them through [`DB::transaction`].
#[derive(Debug, Default)]
pub struct Tables {
    users: HashMap<UserId, User>,
    users_by_email: HashMap<String, UserId>,
    markets: HashMap<MarketId, Market>,
    market_order: Vec<MarketId>,
    bets: HashMap<BetId, Bet>,
    market_bets: HashMap<MarketId, Vec<BetId>>,
    user_bets: HashMap<UserId, Vec<BetId>>,
}

/// Owned handle to the ledger. Readers share the lock, every mutation
/// sequence holds it exclusively until it is done.
#[derive(Debug, Default)]
pub struct DB {
    tables: RwLock<Tables>,
}
impl DB {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read()
    }
    pub fn transaction(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write()
    }
}

fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}

impl Tables {
    pub fn insert_user(&mut self, user: User) -> Result<(), MarketError> {
        let key = email_key(&user.email);
        if self.users_by_email.contains_key(&key) {
            return Err(MarketError::EmailTaken);
        }
        self.users_by_email.insert(key, user.id);
        self.users.insert(user.id, user);
        Ok(())
    }
    pub fn user(&self, user: &UserId) -> Option<&User> {
        self.users.get(user)
    }
    pub fn user_mut(&mut self, user: &UserId) -> Option<&mut User> {
        self.users.get_mut(user)
    }
    pub fn user_by_email(&self, email: &str) -> Option<&User> {
        self.users_by_email
            .get(&email_key(email))
            .and_then(|id| self.users.get(id))
    }
    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn insert_market(&mut self, market: Market) {
        self.market_order.push(market.id);
        self.market_bets.entry(market.id).or_default();
        self.markets.insert(market.id, market);
    }
    pub fn market(&self, market: &MarketId) -> Option<&Market> {
        self.markets.get(market)
    }
    pub fn market_mut(&mut self, market: &MarketId) -> Option<&mut Market> {
        self.markets.get_mut(market)
    }
    /// Markets in reverse insertion order, which is newest first since
    /// creation timestamps are taken under the write lock.
    pub fn markets_newest_first(&self) -> impl Iterator<Item = &Market> {
        self.market_order
            .iter()
            .rev()
            .filter_map(|id| self.markets.get(id))
    }
    pub fn market_ids(&self) -> Vec<MarketId> {
        self.market_order.clone()
    }

    pub fn insert_bet(&mut self, bet: Bet) -> Result<(), MarketError> {
        if !self.markets.contains_key(&bet.market_id) {
            return Err(MarketError::NotFound(format!("Market {}", bet.market_id)));
        }
        if !self.users.contains_key(&bet.user_id) {
            return Err(MarketError::NotFound(format!("User {}", bet.user_id)));
        }
        self.market_bets
            .entry(bet.market_id)
            .or_default()
            .push(bet.id);
        self.user_bets.entry(bet.user_id).or_default().push(bet.id);
        self.bets.insert(bet.id, bet);
        Ok(())
    }
    pub fn bet(&self, bet: &BetId) -> Option<&Bet> {
        self.bets.get(bet)
    }
    pub fn bet_mut(&mut self, bet: &BetId) -> Option<&mut Bet> {
        self.bets.get_mut(bet)
    }
    /// Bet ids of a market in placement order.
    pub fn market_bet_ids(&self, market: &MarketId) -> Vec<BetId> {
        self.market_bets.get(market).cloned().unwrap_or_default()
    }
    pub fn market_bets_newest_first(&self, market: &MarketId) -> Vec<Bet> {
        Self::collect_newest_first(&self.bets, self.market_bets.get(market))
    }
    pub fn user_bets_newest_first(&self, user: &UserId) -> Vec<Bet> {
        Self::collect_newest_first(&self.bets, self.user_bets.get(user))
    }
    fn collect_newest_first(bets: &HashMap<BetId, Bet>, ids: Option<&Vec<BetId>>) -> Vec<Bet> {
        ids.map(|ids| {
            ids.iter()
                .rev()
                .filter_map(|id| bets.get(id).cloned())
                .collect()
        })
        .unwrap_or_default()
    }
}
