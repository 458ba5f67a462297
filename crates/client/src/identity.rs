//! Who the session speaks for on the push channel.
//!
//! The token is issued elsewhere and consumed opaquely; claims are read
//! without signature verification, only to decide whether this is an
//! authenticated LTI context or an anonymous viewer.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use livesync_channel::{Identity, IdentityProvider};
use livesync_core::SyncError;

/// Identity claims carried by the platform token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: Option<String>,
    /// Resource the token was issued for.
    pub resource_id: Option<String>,
    /// LTI consumer site; present only for launches through a platform.
    pub consumer_site: Option<String>,
    pub user_id: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl TokenClaims {
    /// An authenticated LTI user carries both a consumer site and a
    /// stable user id.
    pub fn is_lti_user(&self) -> bool {
        self.consumer_site.is_some() && self.user_id.is_some()
    }
}

/// Read claims out of a token without verifying its signature. The
/// server is the only party that validates tokens; the client merely
/// inspects them.
pub fn decode_claims(token: &str) -> Result<TokenClaims, SyncError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.set_required_spec_claims::<&str>(&[]);

    decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| SyncError::Malformed(format!("undecodable token: {e}")))
}

const ANONYMOUS_ID_FILE: &str = ".livesync_anonymous_id";

/// Locally generated viewer id, persisted across sessions in a dot-file.
pub struct AnonymousId {
    path: PathBuf,
    cached: Mutex<Option<String>>,
}

impl AnonymousId {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(ANONYMOUS_ID_FILE),
            cached: Mutex::new(None),
        }
    }

    /// The persisted id, generated on first use.
    pub fn get(&self) -> String {
        let mut cached = self.cached.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(id) = cached.as_ref() {
            return id.clone();
        }

        let id = match std::fs::read_to_string(&self.path) {
            Ok(contents) if !contents.trim().is_empty() => contents.trim().to_string(),
            _ => {
                let id = uuid::Uuid::new_v4().to_string();
                if let Err(e) = std::fs::write(&self.path, &id) {
                    warn!(path = %self.path.display(), error = %e, "cannot persist anonymous id");
                }
                debug!(anonymous_id = %id, "generated anonymous viewer id");
                id
            }
        };
        *cached = Some(id.clone());
        id
    }
}

/// Per-attempt identity resolution for the connection manager.
pub struct SessionIdentity {
    jwt: Option<String>,
    anonymous: AnonymousId,
}

impl SessionIdentity {
    pub fn new(jwt: Option<String>, state_dir: &Path) -> Self {
        Self {
            jwt,
            anonymous: AnonymousId::new(state_dir),
        }
    }
}

impl IdentityProvider for SessionIdentity {
    fn identity(&self) -> Identity {
        if let Some(token) = &self.jwt {
            match decode_claims(token) {
                Ok(claims) if claims.is_lti_user() => return Identity::Jwt(token.clone()),
                Ok(_) => debug!("token is not an LTI user, connecting anonymously"),
                Err(e) => warn!(error = %e, "token claims unreadable, connecting anonymously"),
            }
        }
        Identity::Anonymous(self.anonymous.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(claims: &TokenClaims) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(b"some-secret-the-client-never-knows"),
        )
        .unwrap()
    }

    fn lti_claims() -> TokenClaims {
        TokenClaims {
            sub: Some("v1".into()),
            resource_id: Some("v1".into()),
            consumer_site: Some("site-1".into()),
            user_id: Some("u-9".into()),
            roles: vec!["instructor".into()],
        }
    }

    #[test]
    fn decodes_claims_without_knowing_the_secret() {
        let claims = decode_claims(&token(&lti_claims())).unwrap();
        assert!(claims.is_lti_user());
        assert_eq!(claims.user_id.as_deref(), Some("u-9"));
    }

    #[test]
    fn lti_token_yields_jwt_identity() {
        let token = token(&lti_claims());
        let dir = std::env::temp_dir();
        let identity = SessionIdentity::new(Some(token.clone()), &dir);
        assert_eq!(identity.identity(), Identity::Jwt(token));
    }

    #[test]
    fn public_token_falls_back_to_anonymous() {
        let mut claims = lti_claims();
        claims.consumer_site = None;
        claims.user_id = None;
        let dir = std::env::temp_dir().join(format!("ls_anon_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let identity = SessionIdentity::new(Some(token(&claims)), &dir);
        match identity.identity() {
            Identity::Anonymous(id) => assert!(!id.is_empty()),
            other => panic!("expected anonymous identity, got {other:?}"),
        }
    }

    #[test]
    fn anonymous_id_persists_across_instances() {
        let dir = std::env::temp_dir().join(format!("ls_anon_persist_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let first = AnonymousId::new(&dir).get();
        let second = AnonymousId::new(&dir).get();
        assert_eq!(first, second);
    }

    #[test]
    fn garbage_token_falls_back_to_anonymous() {
        let dir = std::env::temp_dir();
        let identity = SessionIdentity::new(Some("not-a-jwt".into()), &dir);
        assert!(matches!(identity.identity(), Identity::Anonymous(_)));
    }
}
