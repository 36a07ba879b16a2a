// Authentication for the HTTP surfaces.
//
// - `api_secret`: shared `X-Api-Secret` check on the job routes.
// - `bearer`: JWT bearer check on the MCP endpoint.
// - `jwt`: access token issuance and validation.
// - `oauth`: authorization server that hands out those tokens.

pub mod api_secret;
pub mod bearer;
pub mod jwt;
pub mod oauth;

pub use api_secret::{require_api_secret, API_SECRET_HEADER};
pub use bearer::require_bearer_auth;
pub use jwt::{AccessTokenService, ClientGrant};
pub use oauth::OAuthState;
