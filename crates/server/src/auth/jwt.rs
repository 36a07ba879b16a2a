use anyhow::{anyhow, bail, Context};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::ServerConfig;

pub const ACCESS_TOKEN_TTL_SECONDS: i64 = 8 * 60 * 60;

/// Signing secret used when neither a JWT secret nor an API secret is set.
pub const DEV_JWT_SECRET: &str = "gaia-orchestrator-dev-jwt-secret";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AccessTokenClaims {
    sub: String,
    scope: String,
    iat: i64,
    exp: i64,
}

/// Identity carried by a valid MCP access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientGrant {
    pub client_id: String,
    pub scope: String,
}

/// HS256 access tokens for MCP clients authorized through OAuth.
#[derive(Clone)]
pub struct AccessTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl AccessTokenService {
    pub fn new(secret: &str) -> anyhow::Result<Self> {
        if secret.is_empty() {
            bail!("jwt secret must not be empty");
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    /// JWT secret, falling back to the API secret and then a development default.
    pub fn from_config(config: &ServerConfig) -> anyhow::Result<Self> {
        let secret = config
            .jwt_secret
            .as_deref()
            .or(config.api_secret.as_deref())
            .unwrap_or(DEV_JWT_SECRET);
        Self::new(secret)
    }

    pub fn issue_access_token(&self, client_id: &str, scope: &str) -> anyhow::Result<String> {
        self.issue_access_token_at(client_id, scope, current_unix_timestamp()?)
    }

    fn issue_access_token_at(
        &self,
        client_id: &str,
        scope: &str,
        issued_at: i64,
    ) -> anyhow::Result<String> {
        let claims = AccessTokenClaims {
            sub: client_id.to_string(),
            scope: scope.to_string(),
            iat: issued_at,
            exp: issued_at + ACCESS_TOKEN_TTL_SECONDS,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .context("failed to encode access token")
    }

    pub fn validate_access_token(&self, token: &str) -> anyhow::Result<ClientGrant> {
        let claims = decode::<AccessTokenClaims>(token, &self.decoding_key, &self.validation)
            .context("failed to decode access token")?
            .claims;

        Ok(ClientGrant { client_id: claims.sub, scope: claims.scope })
    }
}

fn current_unix_timestamp() -> anyhow::Result<i64> {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|error| anyhow!("system clock is before unix epoch: {error}"))?;

    i64::try_from(duration.as_secs()).context("unix timestamp overflow")
}
