//! Session token issuance and validation.
//!
//! Tokens are HS256 JWTs. Validation is a pure function of the token, the
//! signing secret and the clock: nothing is looked up or stored server-side.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use thiserror::Error;
use uuid::Uuid;

use roadeye_types::api::{Claims, TokenKind};

/// Immutable signing configuration, built once at startup.
#[derive(Clone)]
pub struct SessionConfig {
    pub secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid token")]
    InvalidToken,

    #[error("token has expired")]
    ExpiredToken,

    #[error("failed to sign token: {0}")]
    Signing(jsonwebtoken::errors::Error),
}

pub struct SessionIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl SessionIssuer {
    pub fn new(config: &SessionConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
        }
    }

    pub fn issue_access_token(&self, user_id: Uuid, email: &str) -> Result<String, SessionError> {
        self.issue_at(TokenKind::Access, user_id, email, Utc::now())
    }

    pub fn issue_refresh_token(&self, user_id: Uuid, email: &str) -> Result<String, SessionError> {
        self.issue_at(TokenKind::Refresh, user_id, email, Utc::now())
    }

    pub(crate) fn issue_at(
        &self,
        kind: TokenKind,
        user_id: Uuid,
        email: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<String, SessionError> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };

        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            kind,
            iat: issued_at.timestamp(),
            exp: (issued_at + ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(SessionError::Signing)
    }

    /// Checks signature and expiry against the current time.
    pub fn validate(&self, token: &str) -> Result<Claims, SessionError> {
        self.validate_at(token, Utc::now())
    }

    /// Like [`SessionIssuer::validate`] with an explicit clock. Expiry is
    /// re-checked here after the library's own check, against `now`.
    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, SessionError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => SessionError::ExpiredToken,
                _ => SessionError::InvalidToken,
            }
        })?;

        if data.claims.exp <= now.timestamp() {
            return Err(SessionError::ExpiredToken);
        }

        Ok(data.claims)
    }

    /// Validates and additionally requires the token to be of `kind`.
    pub fn validate_kind(&self, token: &str, kind: TokenKind) -> Result<Claims, SessionError> {
        let claims = self.validate(token)?;
        if claims.kind != kind {
            return Err(SessionError::InvalidToken);
        }
        Ok(claims)
    }
}
