use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};

use parley_types::api::Claims;

use crate::auth::AppState;
use crate::error::ApiError;

/// Extract and validate JWT from Authorization header.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = claims_from_header(
        req.headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok()),
        &state.jwt_secret,
    )?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

pub fn claims_from_header(value: Option<&str>, secret: &str) -> Result<Claims, ApiError> {
    let token = value
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthorized)?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::create_token;
    use uuid::Uuid;

    #[test]
    fn bearer_token_round_trips_to_claims() {
        let user = Uuid::new_v4();
        let token = create_token("secret", user, "alice").unwrap();
        let header = format!("Bearer {token}");

        let claims = claims_from_header(Some(&header), "secret").unwrap();
        assert_eq!(claims.sub, user);
        assert_eq!(claims.username, "alice");
    }

    #[test]
    fn missing_or_foreign_tokens_are_rejected() {
        assert!(matches!(claims_from_header(None, "secret"), Err(ApiError::Unauthorized)));
        assert!(matches!(
            claims_from_header(Some("Basic abc"), "secret"),
            Err(ApiError::Unauthorized)
        ));

        let token = create_token("other", Uuid::new_v4(), "mallory").unwrap();
        let header = format!("Bearer {token}");
        assert!(matches!(
            claims_from_header(Some(&header), "secret"),
            Err(ApiError::Unauthorized)
        ));
    }
}
