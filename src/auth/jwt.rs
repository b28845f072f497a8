use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use crate::{auth::permissions::Role, config::JwtConfig, state::AppState};
use uuid::Uuid;

/// Claim set carried by a session token. Verified purely by signature and
/// expiry; there is no server-side session store, so a token stays valid
/// until it expires or the subject's password changes.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub iss: String,
    pub aud: String,
    pub iat: usize,
    pub exp: usize,
    pub role: Role,
}

#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig {
            secret,
            issuer,
            audience,
            ttl_hours,
            ..
        } = state.config.jwt.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
            ttl: Duration::from_secs((ttl_hours as u64) * 60 * 60),
        }
    }
}

impl JwtKeys {
    pub fn sign(&self, user_id: Uuid, role: Role) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            role,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, role = %role, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, role = %data.claims.role, "jwt verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys() -> JwtKeys {
        let state = AppState::fake();
        JwtKeys::from_ref(&state)
    }

    #[test]
    fn sign_and_verify_carries_subject_and_role() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        let token = keys.sign(user_id, Role::Admin).expect("sign");
        let claims = keys.verify(&token).expect("verify");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
    }

    #[test]
    fn token_has_three_segments() {
        let keys = make_keys();
        let token = keys.sign(Uuid::new_v4(), Role::User).expect("sign");
        assert_eq!(token.split('.').count(), 3);
    }

    #[test]
    fn verify_rejects_expired_token() {
        let keys = make_keys();
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            sub: Uuid::new_v4(),
            iss: keys.issuer.clone(),
            aud: keys.audience.clone(),
            iat: (now - TimeDuration::hours(3)).unix_timestamp() as usize,
            exp: (now - TimeDuration::hours(2)).unix_timestamp() as usize,
            role: Role::User,
        };
        let token = encode(&Header::default(), &claims, &keys.encoding).expect("encode");
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn verify_rejects_tampered_signature() {
        let keys = make_keys();
        let token = keys.sign(Uuid::new_v4(), Role::User).expect("sign");
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = format!("{}x", parts[2]);
        parts[2] = &forged;
        assert!(keys.verify(&parts.join(".")).is_err());
    }

    #[test]
    fn verify_rejects_wrong_issuer_or_audience() {
        let keys = make_keys();
        let mut other = make_keys();
        other.issuer = "https://evil.example".into();
        let token = other.sign(Uuid::new_v4(), Role::User).expect("sign");
        assert!(keys.verify(&token).is_err());
    }
}
