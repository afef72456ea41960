use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::{errors::ServiceError, AppState};

pub const UNAUTHORIZED_MESSAGE: &str = "Niet geautoriseerd";

/// Checks `Authorization: Bearer <token>` against the configured admin token.
///
/// The comparison is exact: no trimming, no case folding. A missing or
/// malformed header is treated the same as a wrong token.
pub fn is_authorized(authorization: Option<&str>, admin_token: &str) -> bool {
    match authorization.and_then(|value| value.strip_prefix("Bearer ")) {
        Some(token) => !admin_token.is_empty() && token == admin_token,
        None => false,
    }
}

/// Rejects unauthenticated requests with 401 before the wrapped handler runs.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let authorization = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    if !is_authorized(authorization, &state.config.admin_token) {
        warn!(
            path = %request.uri().path(),
            has_header = authorization.is_some(),
            "rejected admin request"
        );
        return ServiceError::Unauthorized(UNAUTHORIZED_MESSAGE.to_string()).into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Some("Bearer s3cret-admin-token"), true)]
    #[case(Some("Bearer s3cret-admin-token "), false)]
    #[case(Some("bearer s3cret-admin-token"), false)]
    #[case(Some("Bearer S3CRET-ADMIN-TOKEN"), false)]
    #[case(Some("s3cret-admin-token"), false)]
    #[case(Some("Bearer "), false)]
    #[case(None, false)]
    fn bearer_token_must_match_exactly(#[case] header: Option<&str>, #[case] expected: bool) {
        assert_eq!(is_authorized(header, "s3cret-admin-token"), expected);
    }

    #[test]
    fn empty_configured_token_never_authorizes() {
        assert!(!is_authorized(Some("Bearer "), ""));
    }
}
