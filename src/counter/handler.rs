use super::cors::Cors;
use super::event::{json_response, GatewayRequest, HttpResponse, TriggerEvent};
use super::service::Counter;
use super::store::{CounterStore, StoreFault};
use http::{HeaderValue, StatusCode};
use serde_json::json;

/// Time reserved to build and return the error response when the
/// invocation deadline is reached during dispatch
const DISPATCH_MARGIN: std::time::Duration = std::time::Duration::from_millis(50);

const ROOT_MESSAGE: &str = "View Counter API";

/// Entry point for every invocation. Rejects events which do not come from
/// an API Gateway, routes gateway requests to the [`Counter`] and converts
/// every fault raised while doing so into a `500` response.
#[derive(Debug)]
pub struct Handler<S> {
    counter: Counter<S>,
    cors: Cors,
}

impl<S: CounterStore> Handler<S> {
    /// Create a handler serving the counter held by `store`
    pub fn new(store: S, cors: Cors) -> Self {
        Self {
            counter: Counter::new(store),
            cors,
        }
    }

    /// The counter service used by this handler
    pub fn counter(&self) -> &Counter<S> {
        &self.counter
    }

    /// Handles a raw lambda payload. Never fails: faults are returned
    /// as `500` responses.
    ///
    /// If `deadline` is given, dispatch is aborted shortly before it is
    /// reached and answered with a `500` response.
    pub async fn handle(
        &self,
        payload: serde_json::Value,
        deadline: Option<tokio::time::Instant>,
    ) -> HttpResponse {
        let request: GatewayRequest = match TriggerEvent::classify(payload) {
            Ok(TriggerEvent::Gateway(event)) => event.into(),
            Ok(TriggerEvent::Other) => {
                log::warn!("Rejecting event which was not sent by an API Gateway");
                return json_response(
                    StatusCode::BAD_REQUEST,
                    &json!({ "error": "Invalid event source" }),
                );
            }
            Err(err) => {
                return internal_server_error(
                    &anyhow::Error::new(err).context("Unable to parse API Gateway event"),
                )
            }
        };
        if let Some(response) = self.cors.preflight(&request) {
            return response;
        }

        let response = match self.dispatch_until(&request, deadline).await {
            Ok(response) => response,
            Err(err) => internal_server_error(&err),
        };
        self.cors.apply(&request, response)
    }

    async fn dispatch_until(
        &self,
        request: &GatewayRequest,
        deadline: Option<tokio::time::Instant>,
    ) -> anyhow::Result<HttpResponse> {
        match deadline.and_then(|deadline| deadline.checked_sub(DISPATCH_MARGIN)) {
            Some(deadline) => tokio::time::timeout_at(deadline, self.dispatch(request))
                .await
                .map_err(|_| StoreFault::Timeout)?,
            None => self.dispatch(request).await,
        }
    }

    async fn dispatch(&self, request: &GatewayRequest) -> anyhow::Result<HttpResponse> {
        let path = match request.path.trim_end_matches('/') {
            "" => "/",
            path => path,
        };
        log::info!("Dispatching {} {}", request.method, path);

        let response = match (path, request.method.as_str()) {
            ("/", "GET") => json_response(StatusCode::OK, &json!({ "message": ROOT_MESSAGE })),
            ("/api/counter", "GET") => {
                let value = self.counter.read_counter().await?;
                json_response(StatusCode::OK, &json!({ "counter": value }))
            }
            ("/api/counter", "POST") => {
                let value = self.counter.increment_counter().await?;
                log::info!("Incremented counter to {}", value);
                json_response(StatusCode::OK, &json!({ "counter": value }))
            }
            ("/", _) => method_not_allowed("GET"),
            ("/api/counter", _) => method_not_allowed("GET, POST"),
            _ => json_response(StatusCode::NOT_FOUND, &json!({ "detail": "Not Found" })),
        };
        Ok(response)
    }
}

fn internal_server_error(err: &anyhow::Error) -> HttpResponse {
    log::error!("{:?}", err);
    json_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        &json!({ "error": format!("Internal server error: {}", err) }),
    )
}

fn method_not_allowed(allow: &'static str) -> HttpResponse {
    let mut response = json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &json!({ "detail": "Method Not Allowed" }),
    );
    let _ = response
        .headers
        .insert(http::header::ALLOW, HeaderValue::from_static(allow));
    response
}
