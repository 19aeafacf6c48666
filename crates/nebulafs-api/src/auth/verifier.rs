//! Bearer-token verification.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use serde::Deserialize;

use nebulafs_core::config::AuthConfig;
use nebulafs_core::error::{Error, ErrorCode, Result};

use super::jwks::JwksCache;

/// Claims extracted from a verified token.
#[derive(Debug, Clone, Default)]
pub struct JwtClaims {
    /// `sub` claim.
    pub subject: String,
    /// `iss` claim.
    pub issuer: String,
    /// `aud` claim, normalized to a list.
    pub audience: Vec<String>,
    /// Scopes from the space-delimited `scope` claim and/or the `scp` array.
    pub scopes: Vec<String>,
}

/// The raw claim set we care about; everything else is ignored.
#[derive(Debug, Deserialize)]
struct TokenPayload {
    sub: Option<String>,
    iss: Option<String>,
    aud: Option<Audience>,
    scope: Option<String>,
    scp: Option<Vec<String>>,
}

/// `aud` can be a scalar or an array per the JWT spec.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(aud) => vec![aud],
            Self::Many(auds) => auds,
        }
    }
}

/// Validates compact three-segment bearer tokens against the configured
/// issuer, audience, algorithm, and JWKS key material.
///
/// Every verification failure maps to a single unauthorized kind with a
/// short stable message; crypto internals are never surfaced to clients.
pub struct JwtVerifier {
    config: AuthConfig,
    jwks: JwksCache,
}

impl JwtVerifier {
    /// Create a verifier from the auth configuration.
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            config: config.clone(),
            jwks: JwksCache::new(config.jwks_url.clone(), config.cache_ttl_seconds),
        }
    }

    /// Whether bearer-token authorization is enabled.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// Verify a token and return its claims.
    ///
    /// When auth is disabled this short-circuits with empty claims.
    ///
    /// # Errors
    ///
    /// Returns unauthorized for any malformed, expired, mis-issued,
    /// mis-audienced, or badly-signed token, and for key-resolution
    /// failures.
    pub async fn verify(&self, token: &str) -> Result<JwtClaims> {
        if !self.config.enabled {
            return Ok(JwtClaims::default());
        }

        if token.split('.').count() != 3 {
            return Err(unauthorized("invalid token format"));
        }

        let allowed: Algorithm = self
            .config
            .allowed_alg
            .parse()
            .map_err(|_| unauthorized("unsupported alg"))?;

        let header = decode_header(token).map_err(|_| unauthorized("invalid token header"))?;
        if header.alg != allowed {
            return Err(unauthorized("unsupported alg"));
        }
        let kid = match header.kid {
            Some(kid) if !kid.is_empty() => kid,
            _ => return Err(unauthorized("missing kid")),
        };

        let key = self.jwks.get_key(&kid).await?;

        let mut validation = Validation::new(allowed);
        validation.leeway = self.config.clock_skew_seconds;
        validation.validate_nbf = true;
        if !self.config.issuer.is_empty() {
            validation.set_issuer(&[self.config.issuer.as_str()]);
        }
        if self.config.audience.is_empty() {
            validation.validate_aud = false;
        } else {
            validation.set_audience(&[self.config.audience.as_str()]);
        }

        let data = decode::<TokenPayload>(token, &key, &validation)
            .map_err(|e| unauthorized(verification_message(e.kind())))?;
        let payload = data.claims;

        let mut scopes = Vec::new();
        if let Some(scope) = &payload.scope {
            scopes.extend(scope.split_whitespace().map(str::to_string));
        }
        if let Some(scp) = payload.scp {
            scopes.extend(scp);
        }

        Ok(JwtClaims {
            subject: payload.sub.unwrap_or_default(),
            issuer: payload.iss.unwrap_or_default(),
            audience: payload.aud.map(Audience::into_vec).unwrap_or_default(),
            scopes,
        })
    }
}

fn unauthorized(message: impl Into<String>) -> Error {
    Error::api(ErrorCode::Unauthorized, message)
}

/// Short stable messages per failure class.
fn verification_message(kind: &ErrorKind) -> &'static str {
    match kind {
        ErrorKind::ExpiredSignature => "token expired",
        ErrorKind::ImmatureSignature => "token not yet valid",
        ErrorKind::InvalidIssuer => "issuer mismatch",
        ErrorKind::InvalidAudience => "audience mismatch",
        ErrorKind::InvalidSignature => "signature verification failed",
        ErrorKind::MissingRequiredClaim(_) => "missing exp",
        _ => "invalid token",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled_config() -> AuthConfig {
        AuthConfig {
            enabled: true,
            issuer: "https://issuer.test".to_string(),
            audience: "nebulafs".to_string(),
            jwks_url: "/nonexistent/jwks.json".to_string(),
            ..AuthConfig::default()
        }
    }

    #[tokio::test]
    async fn test_disabled_returns_empty_claims() {
        let verifier = JwtVerifier::new(&AuthConfig::default());
        let claims = verifier.verify("whatever").await.unwrap();
        assert!(claims.subject.is_empty());
        assert!(claims.scopes.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_tokens_rejected() {
        let verifier = JwtVerifier::new(&enabled_config());

        for token in ["", "one", "one.two", "one.two.three.four"] {
            let err = verifier.verify(token).await.unwrap_err();
            assert_eq!(err.code(), ErrorCode::Unauthorized, "token {token:?}");
        }

        // Three segments but not decodable as a JWT header.
        let err = verifier.verify("not.a.jwt").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unauthorized);
    }

    #[test]
    fn test_audience_normalization() {
        let one: Audience = serde_json::from_str(r#""single""#).unwrap();
        assert_eq!(one.into_vec(), vec!["single"]);

        let many: Audience = serde_json::from_str(r#"["a","b"]"#).unwrap();
        assert_eq!(many.into_vec(), vec!["a", "b"]);
    }

    #[test]
    fn test_verification_messages_are_short() {
        assert_eq!(verification_message(&ErrorKind::ExpiredSignature), "token expired");
        assert_eq!(verification_message(&ErrorKind::InvalidIssuer), "issuer mismatch");
        assert_eq!(verification_message(&ErrorKind::InvalidAudience), "audience mismatch");
    }
}
