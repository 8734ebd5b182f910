//! Request limit per client IP, backed by `tower_governor`.
//!
//! The quota allows `RATE_LIMIT_MAX` requests in a burst and replenishes them
//! evenly over `RATE_LIMIT_WINDOW_SECS`. Clients are told apart by peer
//! address, so the server must be run with `into_make_service_with_connect_info`.

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    body::Body,
    http::{HeaderValue, Response, StatusCode, header::RETRY_AFTER},
    response::IntoResponse,
};
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

use crate::config::Config;
use crate::errors::ApiError;

pub const TOO_MANY_REQUESTS: &str = "Too many requests from this IP, please try again in an hour!";

/// Time between two replenished requests.
fn replenish_period(max_requests: u32, window: Duration) -> Duration {
    (window / max_requests.max(1)).max(Duration::from_millis(1))
}

/// Turn a governor rejection into the API's JSON error body.
fn rejection(error: GovernorError) -> Response<Body> {
    match error {
        GovernorError::TooManyRequests { wait_time, .. } => {
            tracing::warn!(retry_after = wait_time, "Rate limit exceeded");
            let mut response =
                ApiError::custom(StatusCode::TOO_MANY_REQUESTS, TOO_MANY_REQUESTS).into_response();
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(wait_time.max(1)));
            response
        }
        GovernorError::UnableToExtractKey => ApiError::internal(
            "Something went very wrong!",
            Some("Rate limiter could not read the client address".to_string()),
        )
        .into_response(),
        GovernorError::Other { code, msg, .. } => {
            ApiError::custom(code, msg.unwrap_or_else(|| "Request rejected".to_string()))
                .into_response()
        }
    }
}

/// Wrap `router` in the per IP limit described by `config`.
pub fn limit_by_ip<S>(router: Router<S>, config: &Config) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let Some(governor) = GovernorConfigBuilder::default()
        .period(replenish_period(config.rate_limit_max, config.rate_limit_window))
        .burst_size(config.rate_limit_max.max(1))
        .error_handler(rejection)
        .finish()
    else {
        tracing::warn!("Rate limit quota is empty, requests are not limited");
        return router;
    };

    router.layer(GovernorLayer {
        config: Arc::new(governor),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replenish_period_spreads_window() {
        assert_eq!(
            replenish_period(100, Duration::from_secs(3600)),
            Duration::from_secs(36)
        );
        assert_eq!(
            replenish_period(0, Duration::from_secs(60)),
            Duration::from_secs(60)
        );
        assert_eq!(
            replenish_period(10, Duration::ZERO),
            Duration::from_millis(1)
        );
    }

    #[tokio::test]
    async fn test_rejection_uses_error_envelope() {
        let response = rejection(GovernorError::TooManyRequests {
            wait_time: 0,
            headers: None,
        });
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[RETRY_AFTER], "1");

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "fail");
        assert_eq!(body["message"], TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_missing_client_address_is_a_server_error() {
        let response = rejection(GovernorError::UnableToExtractKey);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
