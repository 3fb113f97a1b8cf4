//! HS256 access and refresh tokens for the JSON API.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::{Error as JwtError, ErrorKind};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub token_type: TokenType,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

impl Claims {
    fn new(user_id: &str, username: &str, token_type: TokenType, expires_in: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id.to_string(),
            username: username.to_string(),
            token_type,
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            jti: uuid::Uuid::now_v7().simple().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtKeys {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation: Validation::default(),
            access_ttl: Duration::minutes(config.access_token_minutes),
            refresh_ttl: Duration::days(config.refresh_token_days),
        }
    }

    pub fn issue(&self, user_id: &str, username: &str, token_type: TokenType) -> Result<String, JwtError> {
        let ttl = match token_type {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
        };
        encode(
            &Header::default(),
            &Claims::new(user_id, username, token_type, ttl),
            &self.encoding,
        )
    }

    pub fn issue_pair(&self, user_id: &str, username: &str) -> Result<TokenPair, JwtError> {
        Ok(TokenPair {
            access: self.issue(user_id, username, TokenType::Access)?,
            refresh: self.issue(user_id, username, TokenType::Refresh)?,
        })
    }

    /// Decodes `token`, checking signature, expiry and that it is the
    /// expected kind of token.
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, JwtError> {
        let claims = decode::<Claims>(token, &self.decoding, &self.validation)?.claims;
        if claims.token_type != expected {
            return Err(ErrorKind::InvalidToken.into());
        }
        Ok(claims)
    }
}
