//! Caller resolution. Tokens are issued by the auth service; this side only verifies them.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::{app_error::AppError, app_state::AppState};

/// Claims as written by the auth service (field names included).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "UserID")]
    pub user_id: u64,
    #[serde(rename = "Accid", default)]
    pub accid: String,
    pub exp: u64,
}

/// The authenticated user, inserted into request extensions by [`users_authorization`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerId(pub i64);

/// Verifies HS256 bearer tokens.
#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Resolves the caller id from an `Authorization` header value. `None` means anonymous.
    pub fn caller_id(&self, header: &str) -> Option<CallerId> {
        let token = header.strip_prefix("Bearer ")?.trim();
        let claims = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| tracing::debug!(error = %e, "rejected bearer token"))
            .ok()?
            .claims;
        i64::try_from(claims.user_id)
            .ok()
            .filter(|id| *id != 0)
            .map(CallerId)
    }
}

pub async fn users_authorization(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let caller = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| state.jwt.caller_id(h))
        .ok_or(AppError::Unauthorized)?;

    req.extensions_mut().insert(caller);
    Ok(next.run(req).await)
}
