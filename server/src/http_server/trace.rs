use axum::http::{self, StatusCode};
use tower_http::trace::{MakeSpan, OnResponse};
use tracing::Level;

const UNMATCHED_ROUTE: &str = "unmatched";

#[derive(Debug, Clone, Copy)]
pub(crate) struct Tracer;

impl<Body> MakeSpan<Body> for Tracer {
    fn make_span(&mut self, request: &http::Request<Body>) -> tracing::Span {
        let route = http_route(request);
        let span_name = format!("{} {}", request.method(), route);

        tracing::span!(
            Level::INFO,
            "api.request",
            otel.name = span_name,
            kind = "server",
            url.path = %request.uri().path(),
            url.query = request.uri().query(),
            http.route = route,
            http.request.method = %request.method(),
            api.resource = api_resource(route),
            user_agent.original = request.headers().get("user-agent").and_then(|h| h.to_str().ok()),

            http.response.status_code = tracing::field::Empty,
            api.outcome = tracing::field::Empty,
        )
    }
}

impl<Body> OnResponse<Body> for Tracer {
    fn on_response(
        self,
        response: &http::Response<Body>,
        latency: std::time::Duration,
        span: &tracing::Span,
    ) {
        let status = response.status();
        let outcome = Outcome::from_status(status);
        let latency_ms = latency.as_millis();

        // `ServerError` already logs and reports the failure itself.
        match outcome {
            Outcome::Failed => tracing::warn!(
                status = status.as_u16(),
                latency_ms,
                "request failed"
            ),
            Outcome::Rejected => tracing::debug!(
                status = status.as_u16(),
                latency_ms,
                "request rejected"
            ),
            Outcome::Ok => tracing::debug!(
                status = status.as_u16(),
                latency_ms,
                "request finished"
            ),
        }

        span.record("http.response.status_code", status.as_u16());
        span.record("api.outcome", outcome.as_str());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Ok,
    Rejected,
    Failed,
}

impl Outcome {
    fn from_status(status: StatusCode) -> Self {
        if status.is_server_error() {
            Outcome::Failed
        } else if status.is_client_error() {
            Outcome::Rejected
        } else {
            Outcome::Ok
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Outcome::Ok => "ok",
            Outcome::Rejected => "rejected",
            Outcome::Failed => "failed",
        }
    }
}

/// The matched route template (`/api/recipes/{id}`) rather than the raw path,
/// so spans for the same endpoint share a name.
fn http_route<B>(req: &http::Request<B>) -> &str {
    req.extensions()
        .get::<axum::extract::MatchedPath>()
        .map_or(UNMATCHED_ROUTE, axum::extract::MatchedPath::as_str)
}

/// `/api/meal-plans/{id}/grocery-list` -> `meal-plans`
fn api_resource(route: &str) -> Option<&str> {
    route
        .strip_prefix("/api/")
        .and_then(|rest| rest.split('/').next())
        .filter(|resource| !resource.is_empty())
}
