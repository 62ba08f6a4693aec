use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub name: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(user_id: Uuid, name: String, role: String, ttl_secs: i64) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id,
            name,
            role,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(ttl_secs)).timestamp(),
        }
    }
}

pub fn encode_token(claims: &Claims, secret: &str) -> Result<String, String> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| format!("JWT encode failed: {e}"))
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| format!("JWT decode failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn token_round_trip_keeps_identity() {
        let id = Uuid::new_v4();
        let claims = Claims::new(id, "Ada".into(), "admin".into(), 60);
        let token = encode_token(&claims, SECRET).unwrap();

        let decoded = decode_token(&token, SECRET).unwrap();
        assert_eq!(decoded.sub, id);
        assert_eq!(decoded.role, "admin");
        assert!(decoded.exp > decoded.iat);
    }

    #[test]
    fn rejects_wrong_secret_and_expired_tokens() {
        let claims = Claims::new(Uuid::new_v4(), "Ada".into(), "user".into(), 60);
        let token = encode_token(&claims, SECRET).unwrap();
        assert!(decode_token(&token, "another-secret").is_err());

        // Past the default 60s leeway.
        let expired = Claims::new(Uuid::new_v4(), "Ada".into(), "user".into(), -600);
        let token = encode_token(&expired, SECRET).unwrap();
        assert!(decode_token(&token, SECRET).is_err());
    }
}
