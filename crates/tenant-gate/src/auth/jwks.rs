//! JWKS fetching and caching

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::{Algorithm, DecodingKey};
use parking_lot::RwLock;
use serde::Deserialize;
use url::Url;

use super::error::{AuthError, Result};

/// Minimum spacing between refreshes forced by an unknown `kid`
const MIN_FORCED_REFRESH: Duration = Duration::from_secs(30);

/// JSON Web Key
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    #[serde(default)]
    pub kid: Option<String>,
    /// Key type (RSA, EC)
    pub kty: String,
    #[serde(default)]
    pub alg: Option<String>,
    #[serde(default)]
    pub r#use: Option<String>,
    // RSA components
    #[serde(default)]
    pub n: Option<String>,
    #[serde(default)]
    pub e: Option<String>,
    // EC components
    #[serde(default)]
    pub crv: Option<String>,
    #[serde(default)]
    pub x: Option<String>,
    #[serde(default)]
    pub y: Option<String>,
}

/// JSON Web Key Set
#[derive(Debug, Clone, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

#[derive(Clone)]
struct JwkEntry {
    key: DecodingKey,
    algorithm: Algorithm,
}

#[derive(Default)]
struct KeyRing {
    named: HashMap<String, JwkEntry>,
    unnamed: Vec<JwkEntry>,
}

impl KeyRing {
    fn find(&self, kid: Option<&str>, alg: Algorithm) -> Option<DecodingKey> {
        match kid {
            Some(kid) => self
                .named
                .get(kid)
                .filter(|entry| entry.algorithm == alg)
                .map(|entry| entry.key.clone()),
            None => self
                .unnamed
                .iter()
                .chain(self.named.values())
                .find(|entry| entry.algorithm == alg)
                .map(|entry| entry.key.clone()),
        }
    }

    fn len(&self) -> usize {
        self.named.len() + self.unnamed.len()
    }
}

/// Thread-safe JWKS cache
pub struct JwksCache {
    ring: RwLock<KeyRing>,
    jwks_uri: Url,
    client: reqwest::Client,
    ttl: Duration,
    last_refresh: RwLock<Option<Instant>>,
}

impl std::fmt::Debug for JwksCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwksCache")
            .field("jwks_uri", &self.jwks_uri)
            .field("ttl", &self.ttl)
            .field("keys_count", &self.ring.read().len())
            .finish_non_exhaustive()
    }
}

impl JwksCache {
    pub fn new(jwks_uri: Url, ttl: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AuthError::Config(format!("JWKS HTTP client: {e}")))?;

        Ok(Self {
            ring: RwLock::new(KeyRing::default()),
            jwks_uri,
            client,
            ttl,
            last_refresh: RwLock::new(None),
        })
    }

    /// Get key for validation
    ///
    /// An unknown `kid` triggers one early refresh (key rotation), rate
    /// limited so that garbage `kid`s cannot hammer the key endpoint.
    pub async fn get_key(&self, kid: Option<&str>, alg: Algorithm) -> Result<DecodingKey> {
        if self.is_stale(self.ttl)
            && let Err(e) = self.refresh().await
        {
            if self.ring.read().len() == 0 {
                return Err(e);
            }
            tracing::warn!(error = %e, "JWKS refresh failed, using cached keys");
        }

        let found = self.ring.read().find(kid, alg);
        if let Some(key) = found {
            return Ok(key);
        }

        if kid.is_some() && self.is_stale(MIN_FORCED_REFRESH) {
            self.refresh().await?;
            let found = self.ring.read().find(kid, alg);
            if let Some(key) = found {
                return Ok(key);
            }
        }

        Err(kid.map_or(AuthError::NoMatchingKey, |kid| {
            AuthError::KeyNotFound(kid.to_string())
        }))
    }

    /// Refresh JWKS from remote
    pub async fn refresh(&self) -> Result<()> {
        tracing::debug!(jwks_uri = %self.jwks_uri, "Refreshing JWKS");

        let jwks: JwkSet = self
            .client
            .get(self.jwks_uri.clone())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| AuthError::JwksFetch(e.to_string()))?
            .json()
            .await
            .map_err(|e| AuthError::JwksParse(e.to_string()))?;

        let ring = build_ring(&jwks)?;
        let keys_count = ring.len();

        *self.ring.write() = ring;
        *self.last_refresh.write() = Some(Instant::now());

        tracing::info!(keys_count, "JWKS refreshed successfully");

        Ok(())
    }

    fn is_stale(&self, max_age: Duration) -> bool {
        self.last_refresh
            .read()
            .is_none_or(|t| t.elapsed() > max_age)
    }
}

fn build_ring(jwks: &JwkSet) -> Result<KeyRing> {
    let mut ring = KeyRing::default();
    for jwk in &jwks.keys {
        if jwk.r#use.as_deref().is_some_and(|u| u != "sig") {
            continue;
        }
        if let Some((key, algorithm)) = decode_jwk(jwk)? {
            let entry = JwkEntry { key, algorithm };
            match &jwk.kid {
                Some(kid) => {
                    ring.named.insert(kid.clone(), entry);
                }
                None => ring.unnamed.push(entry),
            }
        }
    }
    Ok(ring)
}

fn decode_jwk(jwk: &Jwk) -> Result<Option<(DecodingKey, Algorithm)>> {
    let alg = match jwk.alg.as_deref() {
        Some("RS256") => Algorithm::RS256,
        Some("RS384") => Algorithm::RS384,
        Some("RS512") => Algorithm::RS512,
        Some("ES256") => Algorithm::ES256,
        Some("ES384") => Algorithm::ES384,
        None => match (jwk.kty.as_str(), jwk.crv.as_deref()) {
            ("RSA", _) => Algorithm::RS256,
            ("EC", Some("P-256")) => Algorithm::ES256,
            ("EC", Some("P-384")) => Algorithm::ES384,
            _ => return Ok(None),
        },
        _ => return Ok(None),
    };

    let component = |value: &Option<String>, name: &str| {
        value
            .as_deref()
            .ok_or_else(|| AuthError::JwksParse(format!("Missing '{name}' in {} key", jwk.kty)))
    };

    let key = match jwk.kty.as_str() {
        "RSA" => DecodingKey::from_rsa_components(component(&jwk.n, "n")?, component(&jwk.e, "e")?)
            .map_err(|e| AuthError::JwksParse(format!("Invalid RSA components: {e}")))?,
        "EC" => DecodingKey::from_ec_components(component(&jwk.x, "x")?, component(&jwk.y, "y")?)
            .map_err(|e| AuthError::JwksParse(format!("Invalid EC components: {e}")))?,
        other => {
            tracing::debug!(kty = other, "Skipping unsupported key type");
            return Ok(None);
        }
    };

    Ok(Some((key, alg)))
}

/// Background JWKS refresh task builder
pub struct JwksRefreshTask {
    cache: Arc<JwksCache>,
    interval: Duration,
}

impl std::fmt::Debug for JwksRefreshTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwksRefreshTask")
            .field("cache", &self.cache)
            .field("interval", &self.interval)
            .finish()
    }
}

impl JwksRefreshTask {
    #[must_use]
    pub const fn new(cache: Arc<JwksCache>, interval: Duration) -> Self {
        Self { cache, interval }
    }

    pub fn spawn(
        self,
        shutdown: tokio_util::sync::CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.cache.refresh().await {
                            tracing::warn!(error = %e, "Background JWKS refresh failed");
                        }
                    }
                    () = shutdown.cancelled() => {
                        tracing::debug!("JWKS refresh task shutting down");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jwk_set_deserialize() {
        let json = r#"{
            "keys": [
                {"kid": "key1", "kty": "RSA", "alg": "RS256", "n": "test_n", "e": "AQAB"},
                {"kid": "ec-key", "kty": "EC", "alg": "ES256", "crv": "P-256", "x": "x", "y": "y"}
            ]
        }"#;
        let jwks: JwkSet = serde_json::from_str(json).unwrap();
        assert_eq!(jwks.keys.len(), 2);
        assert_eq!(jwks.keys[0].kid.as_deref(), Some("key1"));
        assert_eq!(jwks.keys[1].crv.as_deref(), Some("P-256"));
    }

    #[test]
    fn test_decode_jwk_skips_unsupported() {
        let oct: Jwk = serde_json::from_str(r#"{"kty": "oct", "k": "abc"}"#).unwrap();
        assert!(decode_jwk(&oct).unwrap().is_none());

        let ps256: Jwk =
            serde_json::from_str(r#"{"kty": "RSA", "alg": "PS256", "n": "n", "e": "e"}"#).unwrap();
        assert!(decode_jwk(&ps256).unwrap().is_none());
    }

    #[test]
    fn test_decode_jwk_missing_component() {
        let jwk: Jwk = serde_json::from_str(r#"{"kty": "RSA", "alg": "RS256", "e": "AQAB"}"#).unwrap();
        let err = decode_jwk(&jwk).unwrap_err();
        assert!(err.to_string().contains("Missing 'n'"));
    }

    #[test]
    fn test_build_ring_skips_encryption_keys() {
        let jwks: JwkSet = serde_json::from_str(
            r#"{"keys": [{"kid": "enc", "kty": "RSA", "use": "enc", "n": "n", "e": "AQAB"}]}"#,
        )
        .unwrap();
        assert_eq!(build_ring(&jwks).unwrap().len(), 0);
    }

    #[test]
    fn test_jwks_cache_stale_initially() {
        let cache = JwksCache::new(
            Url::parse("https://example.com/.well-known/jwks.json").unwrap(),
            Duration::from_secs(3600),
        )
        .unwrap();
        assert!(cache.is_stale(Duration::from_secs(3600)));
    }

    #[tokio::test]
    async fn test_unreachable_jwks_is_server_side_error() {
        let cache = JwksCache::new(
            Url::parse("http://127.0.0.1:9/jwks.json").unwrap(),
            Duration::from_secs(3600),
        )
        .unwrap();

        let err = cache.get_key(Some("kid"), Algorithm::RS256).await.unwrap_err();
        assert!(err.is_server_side());
    }
}
