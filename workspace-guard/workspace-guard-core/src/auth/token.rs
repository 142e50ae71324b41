use super::state::AuthInfo;
use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Bearer token claims. `exp` is optional: tokens without it never expire,
/// tokens past it are rejected.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

impl Claims {
    pub fn into_auth_info(self) -> AuthInfo {
        AuthInfo {
            backend_roles: Some(self.roles),
            user_name: Some(self.sub),
        }
    }
}

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Option<Claims>;
}

pub struct Hs256Verifier {
    key: DecodingKey,
}

impl Hs256Verifier {
    pub fn new(secret: String) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

#[async_trait]
impl TokenVerifier for Hs256Verifier {
    async fn verify(&self, token: &str) -> Option<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        decode::<Claims>(token, &self.key, &validation)
            .ok()
            .map(|d| d.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, claims: &Claims) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn valid_token_yields_claims() {
        let verifier = Hs256Verifier::new("secret".into());
        let claims = Claims {
            sub: "alice".into(),
            roles: vec!["ops".into()],
            exp: None,
        };
        let verified = verifier.verify(&token("secret", &claims)).await.unwrap();
        let info = verified.into_auth_info();
        assert_eq!(info.user_name.as_deref(), Some("alice"));
        assert_eq!(info.backend_roles, Some(vec!["ops".to_string()]));
    }

    #[tokio::test]
    async fn wrong_secret_is_rejected() {
        let verifier = Hs256Verifier::new("secret".into());
        let claims = Claims {
            sub: "alice".into(),
            roles: vec![],
            exp: None,
        };
        assert!(verifier.verify(&token("other", &claims)).await.is_none());
        assert!(verifier.verify("not-a-jwt").await.is_none());
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let verifier = Hs256Verifier::new("secret".into());
        let expired = Claims {
            sub: "alice".into(),
            roles: vec![],
            exp: Some(1),
        };
        assert!(verifier.verify(&token("secret", &expired)).await.is_none());

        let live = Claims {
            exp: Some(jsonwebtoken::get_current_timestamp() + 3600),
            ..expired
        };
        assert!(verifier.verify(&token("secret", &live)).await.is_some());
    }
}
