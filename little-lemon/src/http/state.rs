use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::auth::AuthSettings;
use crate::db::Database;

#[derive(Debug, Clone, Copy)]
struct IssuedToken {
    user_id: i64,
    expires_at: Option<Instant>,
}

impl IssuedToken {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |expires_at| expires_at > now)
    }
}

/// Login tokens issued by `/auth/token/login/`, keyed by the token string.
///
/// Expired entries are dropped when looked up and swept on every new login.
/// A lifetime too large to represent as an `Instant` never expires.
#[derive(Debug, Clone)]
pub struct TokenStore {
    issued: Arc<DashMap<String, IssuedToken>>,
    ttl: Duration,
}

impl TokenStore {
    pub fn new(ttl_hours: u64) -> Self {
        Self::with_ttl(Duration::from_secs(ttl_hours.saturating_mul(3600)))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            issued: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn create(&self, user_id: i64) -> String {
        let now = Instant::now();
        self.issued.retain(|_, issued| issued.is_live(now));

        let token = uuid::Uuid::new_v4().simple().to_string();
        self.issued.insert(
            token.clone(),
            IssuedToken {
                user_id,
                expires_at: now.checked_add(self.ttl),
            },
        );
        token
    }

    pub fn get(&self, token: &str) -> Option<i64> {
        let issued = *self.issued.get(token)?;
        if issued.is_live(Instant::now()) {
            Some(issued.user_id)
        } else {
            self.issued.remove(token);
            None
        }
    }

    pub fn remove(&self, token: &str) -> bool {
        self.issued.remove(token).is_some()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.issued.len()
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub db: Database,
    pub auth: Arc<AuthSettings>,
    pub tokens: TokenStore,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::TokenStore;

    #[test]
    fn tokens_resolve_until_removed() {
        let store = TokenStore::new(24);
        let token = store.create(7);

        assert_eq!(store.get(&token), Some(7));
        assert!(store.remove(&token));
        assert_eq!(store.get(&token), None);
        assert!(!store.remove(&token));
    }

    #[test]
    fn expired_tokens_are_rejected_and_swept() {
        let store = TokenStore::with_ttl(Duration::ZERO);
        let first = store.create(1);
        assert_eq!(store.get(&first), None);

        store.create(2);
        store.create(3);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn huge_lifetimes_do_not_overflow() {
        let store = TokenStore::new(u64::MAX);
        let token = store.create(9);
        assert_eq!(store.get(&token), Some(9));
    }
}
