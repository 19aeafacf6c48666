//! Time-bounded cache of JWKS verification keys.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use tokio::sync::{Mutex, OnceCell};

use nebulafs_core::error::{Error, ErrorCode, Result};

/// Mapping of `kid` to verification key with bounded staleness.
///
/// The cache refreshes when empty or past its absolute TTL, and performs one
/// additional forced refresh when a `kid` is still unknown after the
/// TTL-triggered refresh (covers fresh key rotations). All fetch and parse
/// failures surface as unauthorized: a key that cannot be resolved means the
/// token cannot be trusted.
pub struct JwksCache {
    url: String,
    ttl: Duration,
    state: Mutex<CacheState>,
    // HTTPS client is built lazily, exactly once per cache.
    http: OnceCell<reqwest::Client>,
}

#[derive(Default)]
struct CacheState {
    keys: HashMap<String, DecodingKey>,
    expires_at: Option<Instant>,
}

#[derive(Deserialize)]
struct JwksDocument {
    #[serde(default)]
    keys: Vec<Jwk>,
}

#[derive(Deserialize)]
struct Jwk {
    #[serde(default)]
    kty: String,
    #[serde(default)]
    kid: String,
    #[serde(default)]
    n: String,
    #[serde(default)]
    e: String,
}

impl JwksCache {
    /// Create a cache over a JWKS location (`file://`, a bare filesystem
    /// path, `http://`, or `https://`).
    #[must_use]
    pub fn new(url: impl Into<String>, ttl_seconds: u64) -> Self {
        Self {
            url: url.into(),
            ttl: Duration::from_secs(ttl_seconds),
            state: Mutex::new(CacheState::default()),
            http: OnceCell::new(),
        }
    }

    /// Resolve a verification key by `kid`.
    ///
    /// # Errors
    ///
    /// Returns unauthorized when the JWKS cannot be fetched or parsed, or
    /// when the `kid` is unknown even after a forced refresh.
    pub async fn get_key(&self, kid: &str) -> Result<DecodingKey> {
        let mut state = self.state.lock().await;

        let stale = state.keys.is_empty()
            || state.expires_at.is_none_or(|deadline| Instant::now() >= deadline);
        if stale {
            self.refresh(&mut state).await?;
        }

        if let Some(key) = state.keys.get(kid) {
            return Ok(key.clone());
        }

        // The kid may have been minted after our last fetch.
        self.refresh(&mut state).await?;
        state
            .keys
            .get(kid)
            .cloned()
            .ok_or_else(|| Error::api(ErrorCode::Unauthorized, "kid not found in jwks"))
    }

    async fn refresh(&self, state: &mut CacheState) -> Result<()> {
        let loaded = match self.fetch_document().await {
            Ok(body) => parse_jwks(&body),
            Err(e) => Err(e),
        };
        match loaded {
            Ok(keys) => {
                state.keys = keys;
                state.expires_at = Some(Instant::now() + self.ttl);
                Ok(())
            }
            Err(e) => {
                state.keys.clear();
                state.expires_at = None;
                Err(e)
            }
        }
    }

    async fn fetch_document(&self) -> Result<String> {
        if self.url.is_empty() {
            return Err(unauthorized("jwks url missing"));
        }

        if let Some(path) = self.url.strip_prefix("file://") {
            return read_jwks_file(path).await;
        }

        // Bare filesystem paths (Unix absolute or Windows drive) are allowed
        // for local deployments and tests.
        let bytes = self.url.as_bytes();
        if bytes[0] == b'/' || (bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':')
        {
            return read_jwks_file(&self.url).await;
        }

        let client = self
            .http
            .get_or_try_init(|| async {
                reqwest::Client::builder()
                    .build()
                    .map_err(|e| unauthorized(format!("http client init failed: {e}")))
            })
            .await?;

        let response = client
            .get(&self.url)
            .header("User-Agent", "nebulafs-jwks-cache")
            .send()
            .await
            .map_err(|e| unauthorized(format!("jwks fetch failed: {e}")))?;
        if !response.status().is_success() {
            return Err(unauthorized("jwks fetch failed"));
        }
        response.text().await.map_err(|e| unauthorized(format!("jwks fetch failed: {e}")))
    }
}

async fn read_jwks_file(path: &str) -> Result<String> {
    #[cfg(windows)]
    let path = {
        // Normalize file:///C:/... to C:/... for filesystem APIs.
        let bytes = path.as_bytes();
        if bytes.len() >= 3 && bytes[0] == b'/' && bytes[1].is_ascii_alphabetic() && bytes[2] == b':'
        {
            &path[1..]
        } else {
            path
        }
    };

    tokio::fs::read_to_string(path)
        .await
        .map_err(|_| unauthorized("failed to open jwks file"))
}

/// Parse a JWKS document, keeping only RSA keys with a non-empty `kid`.
fn parse_jwks(body: &str) -> Result<HashMap<String, DecodingKey>> {
    let doc: JwksDocument =
        serde_json::from_str(body).map_err(|e| unauthorized(format!("invalid jwks: {e}")))?;

    let mut keys = HashMap::new();
    for jwk in doc.keys {
        if jwk.kty != "RSA" || jwk.kid.is_empty() {
            continue;
        }
        if let Ok(key) = DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
            keys.insert(jwk.kid, key);
        }
    }

    if keys.is_empty() {
        return Err(unauthorized("jwks contained no rsa keys"));
    }
    Ok(keys)
}

fn unauthorized(message: impl Into<String>) -> Error {
    Error::api(ErrorCode::Unauthorized, message)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    // 2048-bit modulus of a throwaway test key; any well-formed base64url
    // value works since parsing does not validate the key against anything.
    const TEST_N: &str = "0vx7agoebGcQSuuPiLJXZptN9nndrQmbXEps2aiAFbWhM78LhWx4cbbfAAtVT86zwu1RK7aPFFxuhDR1L6tSoc_BJECPebWKRXjBZCiFV4n3oknjhMstn64tZ_2W-5JsGY4Hc5n9yBXArwl93lqt7_RN5w6Cf0h4QyQ5v-65YGjQR0_FDW2QvzqY368QQMicAtaSqzs8KJZgnYb9c7d0zgdAZHzu6qMQvRL5hajrn1n91CbOpbISD08qNLyrdkt-bFTWhAI4vMQFh6WeZu0fM4lFd2NcRwr3XPksINHaQ-G_xBniIqbw0Ls1jF44-csFCur-kEgU8awapJzKnqDKgw";
    const TEST_E: &str = "AQAB";

    fn jwks_body(kid: &str) -> String {
        format!(
            r#"{{"keys":[{{"kty":"RSA","kid":"{kid}","use":"sig","alg":"RS256","n":"{TEST_N}","e":"{TEST_E}"}}]}}"#
        )
    }

    #[test]
    fn test_parse_jwks_filters_non_rsa_and_missing_kid() {
        let body = format!(
            r#"{{"keys":[
                {{"kty":"RSA","kid":"good","n":"{TEST_N}","e":"{TEST_E}"}},
                {{"kty":"EC","kid":"ec-key","crv":"P-256","x":"aa","y":"bb"}},
                {{"kty":"RSA","kid":"","n":"{TEST_N}","e":"{TEST_E}"}}
            ]}}"#
        );
        let keys = parse_jwks(&body).unwrap();
        assert_eq!(keys.len(), 1);
        assert!(keys.contains_key("good"));
    }

    #[test]
    fn test_parse_jwks_empty_fails() {
        assert!(parse_jwks(r#"{"keys":[]}"#).is_err());
        assert!(parse_jwks(r#"{"keys":[{"kty":"EC","kid":"k"}]}"#).is_err());
        assert!(parse_jwks("not json").is_err());
    }

    #[tokio::test]
    async fn test_get_key_from_file_url() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("jwks.json");
        tokio::fs::write(&path, jwks_body("key-1")).await.unwrap();

        let cache = JwksCache::new(format!("file://{}", path.display()), 300);
        cache.get_key("key-1").await.unwrap();

        let err = match cache.get_key("other").await {
            Ok(_) => panic!("expected get_key to fail for unknown kid"),
            Err(err) => err,
        };
        assert_eq!(err.code(), ErrorCode::Unauthorized);
    }

    #[tokio::test]
    async fn test_cached_key_survives_source_removal() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("jwks.json");
        tokio::fs::write(&path, jwks_body("key-1")).await.unwrap();

        let cache = JwksCache::new(path.display().to_string(), 3600);
        cache.get_key("key-1").await.unwrap();

        // Within the TTL, a known kid resolves without re-fetching.
        tokio::fs::remove_file(&path).await.unwrap();
        cache.get_key("key-1").await.unwrap();

        // An unknown kid forces a refresh, which now fails and clears.
        assert!(cache.get_key("rotated").await.is_err());
        assert!(cache.get_key("key-1").await.is_err());
    }

    #[tokio::test]
    async fn test_forced_refresh_picks_up_rotation() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("jwks.json");
        tokio::fs::write(&path, jwks_body("old-key")).await.unwrap();

        let cache = JwksCache::new(path.display().to_string(), 3600);
        cache.get_key("old-key").await.unwrap();

        tokio::fs::write(&path, jwks_body("new-key")).await.unwrap();
        // Unknown kid within the TTL still triggers one forced refresh.
        cache.get_key("new-key").await.unwrap();
    }

    #[tokio::test]
    async fn test_zero_ttl_always_refreshes() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("jwks.json");
        tokio::fs::write(&path, jwks_body("key-1")).await.unwrap();

        let cache = JwksCache::new(path.display().to_string(), 0);
        cache.get_key("key-1").await.unwrap();

        tokio::fs::write(&path, jwks_body("key-2")).await.unwrap();
        cache.get_key("key-2").await.unwrap();
        assert!(cache.get_key("key-1").await.is_err());
    }

    #[tokio::test]
    async fn test_missing_url_and_file() {
        let cache = JwksCache::new("", 300);
        assert!(cache.get_key("any").await.is_err());

        let cache = JwksCache::new("/does/not/exist.json", 300);
        assert!(cache.get_key("any").await.is_err());
    }
}
