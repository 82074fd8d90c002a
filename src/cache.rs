use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedToken {
    pub client_id: String,
    pub home_account_id: String,
    /// Canonical authority the token was issued by.
    pub authority: String,
    pub scopes: Vec<String>,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub id_token: String,
    pub expires_at: SystemTime,
}

impl CachedToken {
    pub fn is_expired(&self, now: SystemTime) -> bool {
        self.expires_at <= now
    }

    fn scope_set(&self) -> BTreeSet<String> {
        normalize_scopes(&self.scopes)
    }
}

fn normalize_scopes(scopes: &[String]) -> BTreeSet<String> {
    scopes.iter().map(|s| s.to_ascii_lowercase()).collect()
}

/// What a lookup must match. `None` fields match anything.
#[derive(Debug, Clone, Default)]
pub struct TokenCriteria {
    pub client_id: String,
    pub home_account_id: Option<String>,
    pub authority: Option<String>,
    /// The entry must grant at least these scopes (case-insensitive).
    pub scopes: Vec<String>,
}

impl TokenCriteria {
    pub fn matches(&self, token: &CachedToken) -> bool {
        if token.client_id != self.client_id {
            return false;
        }
        if let Some(ref account) = self.home_account_id {
            if &token.home_account_id != account {
                return false;
            }
        }
        if let Some(ref authority) = self.authority {
            if &token.authority != authority {
                return false;
            }
        }
        normalize_scopes(&self.scopes).is_subset(&token.scope_set())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    None,
    One(CachedToken),
    Many(usize),
}

/// Token storage consulted by the acquisition flow. Implementations must be
/// safe to share between tasks.
pub trait TokenCache: Send + Sync {
    fn lookup(&self, criteria: &TokenCriteria) -> CacheLookup;

    /// Insert `token`, replacing any entry for the same client, account,
    /// authority and scope set.
    fn store(&self, token: CachedToken);

    /// Remove every entry of an account. Returns how many were removed.
    fn remove_account(&self, client_id: &str, home_account_id: &str) -> usize;

    /// Distinct authorities holding tokens for `client_id`.
    fn authorities(&self, client_id: &str) -> Vec<String>;
}

#[derive(Debug, Default)]
pub struct InMemoryTokenCache {
    entries: Mutex<Vec<CachedToken>>,
}

impl InMemoryTokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TokenCache for InMemoryTokenCache {
    fn lookup(&self, criteria: &TokenCriteria) -> CacheLookup {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let mut matching = entries.iter().filter(|token| criteria.matches(token));
        match (matching.next(), matching.count()) {
            (None, _) => CacheLookup::None,
            (Some(token), 0) => CacheLookup::One(token.clone()),
            (Some(_), rest) => CacheLookup::Many(rest + 1),
        }
    }

    fn store(&self, token: CachedToken) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let scopes = token.scope_set();
        entries.retain(|existing| {
            !(existing.client_id == token.client_id
                && existing.home_account_id == token.home_account_id
                && existing.authority == token.authority
                && existing.scope_set() == scopes)
        });
        entries.push(token);
    }

    fn remove_account(&self, client_id: &str, home_account_id: &str) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|t| !(t.client_id == client_id && t.home_account_id == home_account_id));
        before - entries.len()
    }

    fn authorities(&self, client_id: &str) -> Vec<String> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .iter()
            .filter(|t| t.client_id == client_id)
            .map(|t| t.authority.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn token(account: &str, authority: &str, scopes: &[&str]) -> CachedToken {
        CachedToken {
            client_id: "cid".into(),
            home_account_id: account.into(),
            authority: authority.into(),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            access_token: format!("at-{account}-{}", scopes.join("-")),
            refresh_token: None,
            id_token: "id".into(),
            expires_at: SystemTime::now() + Duration::from_secs(3600),
        }
    }

    fn criteria(scopes: &[&str]) -> TokenCriteria {
        TokenCriteria {
            client_id: "cid".into(),
            home_account_id: Some("u1".into()),
            authority: None,
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn lookup_zero_one_many() {
        let cache = InMemoryTokenCache::new();
        assert_eq!(cache.lookup(&criteria(&["read"])), CacheLookup::None);

        cache.store(token("u1", "https://a/t/", &["read", "write"]));
        match cache.lookup(&criteria(&["READ"])) {
            CacheLookup::One(found) => assert_eq!(found.home_account_id, "u1"),
            other => panic!("Expected One, got: {other:?}"),
        }

        cache.store(token("u1", "https://b/t/", &["read"]));
        assert_eq!(cache.lookup(&criteria(&["read"])), CacheLookup::Many(2));

        let narrowed = TokenCriteria {
            authority: Some("https://b/t/".into()),
            ..criteria(&["read"])
        };
        assert!(matches!(cache.lookup(&narrowed), CacheLookup::One(_)));
    }

    #[test]
    fn store_replaces_same_shape() {
        let cache = InMemoryTokenCache::new();
        cache.store(token("u1", "https://a/t/", &["read"]));
        cache.store(token("u1", "https://a/t/", &["Read"]));
        assert_eq!(cache.len(), 1);

        cache.store(token("u2", "https://a/t/", &["read"]));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn authorities_are_distinct() {
        let cache = InMemoryTokenCache::new();
        cache.store(token("u1", "https://a/t/", &["read"]));
        cache.store(token("u2", "https://a/t/", &["read"]));
        assert_eq!(cache.authorities("cid"), vec!["https://a/t/".to_string()]);

        cache.store(token("u1", "https://b/t/", &["read"]));
        assert_eq!(cache.authorities("cid").len(), 2);
        assert!(cache.authorities("other").is_empty());
    }

    #[test]
    fn remove_account_only_touches_that_account() {
        let cache = InMemoryTokenCache::new();
        cache.store(token("u1", "https://a/t/", &["read"]));
        cache.store(token("u1", "https://b/t/", &["read"]));
        cache.store(token("u2", "https://a/t/", &["read"]));

        assert_eq!(cache.remove_account("cid", "u1"), 2);
        assert_eq!(cache.len(), 1);
        assert!(!cache.is_empty());
    }

    #[test]
    fn expiry() {
        let now = SystemTime::now();
        let mut t = token("u1", "https://a/t/", &["read"]);
        t.expires_at = now;
        assert!(t.is_expired(now));
        t.expires_at = now + Duration::from_secs(1);
        assert!(!t.is_expired(now));
    }
}
