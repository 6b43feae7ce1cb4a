use crate::api::*;
use crate::config::{AuthSettings, Settings};
use crate::db::DB;
use chrono::{DateTime, Duration, Utc};
use log::{debug, trace};
use parking_lot::Mutex;
use rand::distributions::Alphanumeric;
use rand::Rng;
use rust_decimal::Decimal;
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;
const TOKEN_LEN: usize = 30;

struct Session {
    user: UserId,
    last_access: DateTime<Utc>,
}

#[derive(Default)]
struct AuthState {
    sessions: HashMap<SessionToken, Session>,
    /// Known invite codes and the user that hands them out. The seeded
    /// default code belongs to nobody.
    invite_codes: HashMap<InviteCode, Option<UserId>>,
}

/// Turns credentials into identities. Users live in the ledger, sessions
/// and invite codes only here.
pub struct AuthGateway {
    db: Arc<DB>,
    settings: AuthSettings,
    starting_balance: Decimal,
    state: Mutex<AuthState>,
}

impl AuthGateway {
    pub fn new(db: Arc<DB>, settings: &Settings) -> Self {
        let gateway = Self {
            db,
            settings: settings.auth.clone(),
            starting_balance: settings.market.starting_balance,
            state: Mutex::new(AuthState::default()),
        };
        gateway
            .state
            .lock()
            .invite_codes
            .insert(settings.auth.default_invite_code.trim().to_string(), None);
        gateway
    }

    pub fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        invite_code: &str,
    ) -> Result<User, MarketError> {
        let (username, email, invite_code) = (username.trim(), email.trim(), invite_code.trim());
        if username.is_empty() || email.is_empty() || password.is_empty() {
            return Err(MarketError::InvalidInput(
                "Username, email and password are required".into(),
            ));
        }
        if !self.validate_invite_code(invite_code) {
            debug!("Refused registration of {} with invite code {}", email, invite_code);
            return Err(MarketError::InvalidInviteCode);
        }
        let password_hash = hash_password(password, self.settings.pbkdf2_rounds);

        let mut state = self.state.lock();
        let own_code = loop {
            let code = new_invite_code();
            if !state.invite_codes.contains_key(&code) {
                break code;
            }
        };
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
            balance: self.starting_balance,
            invite_code: own_code.clone(),
            invited_by: Some(invite_code.to_string()),
            created_at: Utc::now(),
        };
        self.db.transaction().insert_user(user.clone())?;
        state.invite_codes.insert(own_code, Some(user.id));
        debug!("Registered user {} ({})", user.id, user.email);
        Ok(user)
    }

    pub fn login(&self, email: &str, password: &str) -> Result<(User, SessionToken), MarketError> {
        let user = self
            .db
            .read()
            .user_by_email(email)
            .cloned()
            .ok_or(MarketError::InvalidCredentials)?;
        if !verify_password(password, &user.password_hash) {
            debug!("Wrong password for user {}", user.id);
            return Err(MarketError::InvalidCredentials);
        }
        let token: SessionToken = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LEN)
            .map(char::from)
            .collect();
        trace!("Generated session token {} for user {}", token, user.id);
        self.state.lock().sessions.insert(
            token.clone(),
            Session {
                user: user.id,
                last_access: Utc::now(),
            },
        );
        debug!("User {} logged in", user.id);
        Ok((user, token))
    }

    pub fn logout(&self, token: &str) {
        if let Some(session) = self.state.lock().sessions.remove(token) {
            debug!("User {} logged out", session.user);
        }
    }

    pub fn resolve_identity(&self, token: &str) -> Option<UserId> {
        self.resolve_identity_at(token, Utc::now())
    }
    /// Looks up the session behind `token` and slides its expiry forward.
    pub fn resolve_identity_at(&self, token: &str, now: DateTime<Utc>) -> Option<UserId> {
        let cutoff = self.session_cutoff(now);
        let mut state = self.state.lock();
        let session = state.sessions.get_mut(token)?;
        if cutoff.map_or(false, |cutoff| session.last_access < cutoff) {
            debug!(
                "User {} tried to access after their session expired",
                session.user
            );
            state.sessions.remove(token);
            return None;
        }
        session.last_access = now;
        Some(session.user)
    }

    /// Identity behind a session plus a fresh copy of the user.
    pub fn current_user(&self, token: &str) -> Result<User, MarketError> {
        let id = self
            .resolve_identity(token)
            .ok_or(MarketError::Unauthenticated)?;
        self.db
            .read()
            .user(&id)
            .cloned()
            .ok_or(MarketError::Unauthenticated)
    }

    pub fn purge_expired_sessions(&self, now: DateTime<Utc>) -> usize {
        let Some(cutoff) = self.session_cutoff(now) else {
            return 0;
        };
        let mut state = self.state.lock();
        let before = state.sessions.len();
        state.sessions.retain(|_, s| s.last_access >= cutoff);
        let purged = before - state.sessions.len();
        if purged > 0 {
            debug!("Purged {} expired sessions", purged);
        }
        purged
    }

    pub fn validate_invite_code(&self, code: &str) -> bool {
        self.state.lock().invite_codes.contains_key(code.trim())
    }

    /// Sessions last used before this are expired. `None` if the TTL
    /// reaches back past the earliest representable time.
    fn session_cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let ttl = i64::try_from(self.settings.session_ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)?;
        now.checked_sub_signed(ttl)
    }
}

fn new_invite_code() -> InviteCode {
    Uuid::new_v4().simple().to_string()[..8].to_uppercase()
}

/// Extracts the token from an `Authorization: Bearer <token>` value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// PBKDF2-HMAC-SHA256 with a random salt, encoded as `rounds$salt$hash`.
pub fn hash_password(password: &str, rounds: u32) -> String {
    let salt: [u8; SALT_LEN] = rand::thread_rng().gen();
    let mut hash = [0u8; HASH_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, rounds, &mut hash);
    format!("{}${}${}", rounds, hex::encode(salt), hex::encode(hash))
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(rounds), Some(salt), Some(expected), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    let (Ok(rounds), Ok(salt), Ok(expected)) =
        (rounds.parse::<u32>(), hex::decode(salt), hex::decode(expected))
    else {
        return false;
    };
    if expected.len() != HASH_LEN || rounds == 0 {
        return false;
    }
    let mut hash = [0u8; HASH_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, rounds, &mut hash);
    hash.iter()
        .zip(expected.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

#[cfg(test)]
mod test {
    use super::*;
    use rust_decimal_macros::dec;

    fn gateway() -> AuthGateway {
        let mut settings = Settings::default();
        settings.auth.pbkdf2_rounds = 10;
        AuthGateway::new(Arc::new(DB::new()), &settings)
    }

    #[test]
    fn password_hashes_verify() {
        let stored = hash_password("hunter2", 10);
        assert!(stored.starts_with("10$"));
        assert!(verify_password("hunter2", &stored));
        assert!(!verify_password("hunter3", &stored));
        assert_ne!(stored, hash_password("hunter2", 10));
        assert!(!verify_password("hunter2", "garbage"));
        assert!(!verify_password("hunter2", "10$zz$zz"));
    }

    #[test]
    fn registration_needs_a_known_invite_code() {
        let auth = gateway();
        assert_eq!(
            auth.register("alice", "alice@example.com", "pw", "NOPE"),
            Err(MarketError::InvalidInviteCode)
        );
        let alice = auth
            .register("alice", "alice@example.com", "pw", "FIRSTUSER")
            .unwrap();
        assert_eq!(alice.balance, dec!(1000));
        assert_eq!(alice.invited_by.as_deref(), Some("FIRSTUSER"));
        assert_eq!(alice.invite_code.len(), 8);
        assert_eq!(alice.invite_code, alice.invite_code.to_uppercase());

        // codes can be used again, including the one alice got
        assert!(auth.validate_invite_code(&alice.invite_code));
        let bob = auth
            .register("bob", "bob@example.com", "pw", &alice.invite_code)
            .unwrap();
        assert_eq!(bob.invited_by, Some(alice.invite_code.clone()));
        auth.register("carol", "carol@example.com", "pw", &alice.invite_code)
            .unwrap();
    }

    #[test]
    fn registration_rejects_duplicates_and_blanks() {
        let auth = gateway();
        auth.register("alice", "alice@example.com", "pw", "FIRSTUSER")
            .unwrap();
        assert_eq!(
            auth.register("alice2", "Alice@Example.com", "pw", "FIRSTUSER"),
            Err(MarketError::EmailTaken)
        );
        assert!(matches!(
            auth.register(" ", "x@example.com", "pw", "FIRSTUSER"),
            Err(MarketError::InvalidInput(_))
        ));
        assert!(matches!(
            auth.register("x", "x@example.com", "", "FIRSTUSER"),
            Err(MarketError::InvalidInput(_))
        ));
    }

    #[test]
    fn login_issues_tokens_that_resolve() {
        let auth = gateway();
        let alice = auth
            .register("alice", "alice@example.com", "pw", "FIRSTUSER")
            .unwrap();
        assert_eq!(
            auth.login("alice@example.com", "wrong"),
            Err(MarketError::InvalidCredentials)
        );
        assert_eq!(
            auth.login("nobody@example.com", "pw"),
            Err(MarketError::InvalidCredentials)
        );
        let (user, token) = auth.login("alice@example.com", "pw").unwrap();
        assert_eq!(user.id, alice.id);
        assert_eq!(token.len(), 30);
        assert_eq!(auth.resolve_identity(&token), Some(alice.id));
        assert_eq!(auth.current_user(&token).unwrap().id, alice.id);

        auth.logout(&token);
        assert_eq!(auth.resolve_identity(&token), None);
        assert_eq!(auth.current_user(&token), Err(MarketError::Unauthenticated));
        assert_eq!(auth.resolve_identity("made-up"), None);
    }

    #[test]
    fn sessions_expire_unless_used() {
        let auth = gateway();
        auth.register("alice", "alice@example.com", "pw", "FIRSTUSER")
            .unwrap();
        let (alice, token) = auth.login("alice@example.com", "pw").unwrap();
        let now = Utc::now();
        // each use pushes the expiry out again
        assert_eq!(
            auth.resolve_identity_at(&token, now + Duration::days(6)),
            Some(alice.id)
        );
        assert_eq!(
            auth.resolve_identity_at(&token, now + Duration::days(12)),
            Some(alice.id)
        );
        assert_eq!(
            auth.resolve_identity_at(&token, now + Duration::days(20)),
            None
        );
        // and an expired session is gone for good
        assert_eq!(
            auth.resolve_identity_at(&token, now + Duration::days(12)),
            None
        );
    }

    #[test]
    fn purge_drops_only_stale_sessions() {
        let auth = gateway();
        auth.register("alice", "alice@example.com", "pw", "FIRSTUSER")
            .unwrap();
        let (_, stale) = auth.login("alice@example.com", "pw").unwrap();
        let (_, fresh) = auth.login("alice@example.com", "pw").unwrap();
        let now = Utc::now();
        auth.resolve_identity_at(&fresh, now + Duration::days(5));
        assert_eq!(auth.purge_expired_sessions(now + Duration::days(8)), 1);
        assert!(auth
            .resolve_identity_at(&fresh, now + Duration::days(8))
            .is_some());
        assert!(auth
            .resolve_identity_at(&stale, now + Duration::days(8))
            .is_none());
    }

    #[test]
    fn endless_session_ttl_never_expires() {
        let mut settings = Settings::default();
        settings.auth.pbkdf2_rounds = 10;
        settings.auth.session_ttl_secs = u64::MAX;
        let auth = AuthGateway::new(Arc::new(DB::new()), &settings);
        auth.register("alice", "alice@example.com", "pw", "FIRSTUSER")
            .unwrap();
        let (alice, token) = auth.login("alice@example.com", "pw").unwrap();
        let now = Utc::now();
        assert_eq!(
            auth.resolve_identity_at(&token, now + Duration::days(365 * 50)),
            Some(alice.id)
        );
        assert_eq!(auth.purge_expired_sessions(now + Duration::days(365 * 50)), 0);
        assert_eq!(auth.resolve_identity(&token), Some(alice.id));
    }

    #[test]
    fn bearer_tokens_are_extracted() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer  abc "), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer"), None);
        assert_eq!(bearer_token("Bearer "), None);
    }
}
