use super::event::{text_response, GatewayRequest, HttpResponse};
use http::header::{self, HeaderName, HeaderValue};

const ALLOW_METHODS: &str = "DELETE, GET, HEAD, OPTIONS, PATCH, POST, PUT";
const MAX_AGE: &str = "600";

/// Cross origin policy applied to every route. All methods and headers
/// are allowed, credentials are allowed and origins are restricted to
/// an allow-list.
#[derive(Debug, Clone, Default)]
pub struct Cors {
    allowed_origins: Vec<String>,
}

impl Cors {
    /// Create a policy for the given origins. `*` allows any origin
    pub fn new(allowed_origins: Vec<String>) -> Self {
        Self { allowed_origins }
    }

    fn allows(&self, origin: &HeaderValue) -> bool {
        let Ok(origin) = origin.to_str() else {
            return false;
        };
        self.allowed_origins
            .iter()
            .any(|allowed| allowed == "*" || allowed == origin)
    }

    /// Returns the response to a CORS preflight request, or `None` if the
    /// request is not a preflight request
    pub fn preflight(&self, request: &GatewayRequest) -> Option<HttpResponse> {
        if request.method != http::Method::OPTIONS
            || !request
                .headers
                .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
        {
            return None;
        }
        let origin = request.headers.get(header::ORIGIN)?;

        if !self.allows(origin) {
            log::warn!("Rejecting preflight request from origin: {:?}", origin);
            return Some(text_response(
                http::StatusCode::BAD_REQUEST,
                "Disallowed CORS origin",
            ));
        }
        let mut response = text_response(http::StatusCode::OK, "OK");
        Self::allow_origin(&mut response, origin);
        let _ = response.headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        );
        let _ = response
            .headers
            .insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static(MAX_AGE));
        if let Some(headers) = request.headers.get(header::ACCESS_CONTROL_REQUEST_HEADERS) {
            let _ = response
                .headers
                .insert(header::ACCESS_CONTROL_ALLOW_HEADERS, headers.clone());
        }
        Some(response)
    }

    /// Adds CORS headers to a response if the request origin is allowed
    pub fn apply(&self, request: &GatewayRequest, mut response: HttpResponse) -> HttpResponse {
        if let Some(origin) = request.headers.get(header::ORIGIN) {
            if self.allows(origin) {
                Self::allow_origin(&mut response, origin);
            }
        }
        response
    }

    // Credentials forbid `*` as allowed origin, so the request origin is echoed
    fn allow_origin(response: &mut HttpResponse, origin: &HeaderValue) {
        let headers: [(HeaderName, HeaderValue); 3] = [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone()),
            (
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            ),
            (header::VARY, HeaderValue::from_static("Origin")),
        ];
        for (name, value) in headers {
            let _ = response.headers.insert(name, value);
        }
    }
}
