//! JWT parsing and validation

#[cfg(feature = "jwks")]
use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode_header};

use super::claims::JwtClaims;
use super::config::JwtConfig;
use super::error::{AuthError, Result};
#[cfg(feature = "jwks")]
use super::jwks::JwksCache;

/// Signature and registered-claim verification of a raw bearer token
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<JwtClaims>;
}

/// JWT validator
pub struct JwtValidator {
    config: JwtConfig,
    #[cfg(feature = "jwks")]
    jwks_cache: Option<Arc<JwksCache>>,
    hs_key: Option<DecodingKey>,
}

impl std::fmt::Debug for JwtValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("JwtValidator");
        s.field("issuer", &self.config.issuer);
        #[cfg(feature = "jwks")]
        s.field("has_jwks_cache", &self.jwks_cache.is_some());
        s.field("has_hs_key", &self.hs_key.is_some()).finish()
    }
}

impl JwtValidator {
    /// Validator for shared-secret (HS*) tokens only
    #[must_use]
    pub fn new(config: JwtConfig) -> Self {
        let hs_key = config
            .hs_secret
            .as_ref()
            .map(|s| DecodingKey::from_secret(s.as_bytes()));
        Self {
            config,
            #[cfg(feature = "jwks")]
            jwks_cache: None,
            hs_key,
        }
    }

    /// Use `cache` for asymmetric (RS*/ES*) tokens
    #[cfg(feature = "jwks")]
    #[must_use]
    pub fn with_jwks(mut self, cache: Arc<JwksCache>) -> Self {
        self.jwks_cache = Some(cache);
        self
    }

    pub async fn validate(&self, token: &str) -> Result<JwtClaims> {
        let header = decode_header(token).map_err(|_| AuthError::InvalidToken)?;

        let key = self
            .get_decoding_key(header.kid.as_deref(), header.alg)
            .await?;

        let mut validation = Validation::new(header.alg);

        if let Some(issuer) = &self.config.issuer {
            // Normalize issuer by removing trailing slash for comparison
            validation.set_issuer(&[issuer.as_str().trim_end_matches('/')]);
        }

        if self.config.audience.is_empty() {
            validation.validate_aud = false;
        } else {
            validation.set_audience(&self.config.audience);
        }

        validation.validate_nbf = true;
        validation.leeway = self.config.clock_skew.as_secs();

        let token_data = jsonwebtoken::decode::<JwtClaims>(token, &key, &validation)?;

        Ok(token_data.claims)
    }

    async fn get_decoding_key(&self, kid: Option<&str>, alg: Algorithm) -> Result<DecodingKey> {
        if matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            return self
                .hs_key
                .clone()
                .ok_or(AuthError::UnsupportedAlgorithm(alg));
        }

        #[cfg(feature = "jwks")]
        if let Some(jwks_cache) = &self.jwks_cache {
            return jwks_cache.get_key(kid, alg).await;
        }

        let _ = kid;
        Err(AuthError::UnsupportedAlgorithm(alg))
    }
}

#[async_trait]
impl TokenVerifier for JwtValidator {
    async fn verify(&self, token: &str) -> Result<JwtClaims> {
        self.validate(token).await
    }
}
