use aws_lambda_events::apigw::{ApiGatewayProxyRequest, ApiGatewayV2httpRequest};
use aws_lambda_events::encodings::Body;
use http::{HeaderMap, HeaderValue};

/// Response in the API Gateway proxy integration format
pub type HttpResponse = aws_lambda_events::apigw::ApiGatewayProxyResponse;

/// Inbound lambda payload, classified by its shape
#[derive(Debug, Clone)]
pub enum TriggerEvent {
    /// Payload produced by an API Gateway (REST or HTTP API)
    Gateway(GatewayEvent),
    /// Any other payload, e.g. a direct invocation or a scheduled event
    Other,
}

/// Typed API Gateway event
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// REST API, payload format 1.0
    Rest(Box<ApiGatewayProxyRequest>),
    /// HTTP API, payload format 2.0
    Http(Box<ApiGatewayV2httpRequest>),
}

impl TriggerEvent {
    /// Classifies a raw payload. Only objects containing `httpMethod` or
    /// `requestContext` are treated as gateway events. Fails if a gateway
    /// shaped payload does not match its payload format.
    pub fn classify(payload: serde_json::Value) -> serde_json::Result<Self> {
        let map = match payload.as_object() {
            Some(map) if map.contains_key("httpMethod") || map.contains_key("requestContext") => {
                map
            }
            _ => return Ok(Self::Other),
        };
        let event = if map.get("version").and_then(serde_json::Value::as_str) == Some("2.0") {
            GatewayEvent::Http(Box::new(serde_json::from_value(payload)?))
        } else {
            GatewayEvent::Rest(Box::new(serde_json::from_value(payload)?))
        };
        Ok(Self::Gateway(event))
    }
}

/// The parts of a gateway event used for routing
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    /// Request method
    pub method: http::Method,
    /// Request path, always starting with `/`
    pub path: String,
    /// Request headers
    pub headers: HeaderMap,
}

impl From<GatewayEvent> for GatewayRequest {
    fn from(event: GatewayEvent) -> Self {
        let (method, path, headers) = match event {
            GatewayEvent::Rest(request) => {
                let request = *request;
                (request.http_method, request.path, request.headers)
            }
            GatewayEvent::Http(request) => {
                let request = *request;
                let path = request.raw_path.or(request.request_context.http.path);
                (request.request_context.http.method, path, request.headers)
            }
        };
        let path = match path.filter(|p| !p.is_empty()) {
            Some(p) if p.starts_with('/') => p,
            Some(p) => format!("/{}", p),
            None => "/".to_string(),
        };
        Self {
            method,
            path,
            headers,
        }
    }
}

/// Creates a response with a JSON body
pub(crate) fn json_response(status: http::StatusCode, body: &serde_json::Value) -> HttpResponse {
    response(status, "application/json", body.to_string())
}

/// Creates a response with a plain text body
pub(crate) fn text_response(status: http::StatusCode, body: &str) -> HttpResponse {
    response(status, "text/plain; charset=utf-8", body.to_string())
}

fn response(status: http::StatusCode, content_type: &'static str, body: String) -> HttpResponse {
    let mut headers = HeaderMap::new();
    let _ = headers.insert(
        http::header::CONTENT_TYPE,
        HeaderValue::from_static(content_type),
    );
    HttpResponse {
        status_code: i64::from(status.as_u16()),
        headers,
        body: Some(Body::Text(body)),
        ..HttpResponse::default()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{GatewayEvent, GatewayRequest, TriggerEvent};
    use serde_json::json;

    /// REST API (payload 1.0) event as sent by API Gateway
    pub(crate) fn rest_event(method: &str, path: &str) -> serde_json::Value {
        json!({
            "resource": path,
            "path": path,
            "httpMethod": method,
            "headers": { "Origin": "https://example.com", "Accept": "application/json" },
            "multiValueHeaders": {
                "Origin": ["https://example.com"],
                "Accept": ["application/json"]
            },
            "queryStringParameters": null,
            "multiValueQueryStringParameters": null,
            "pathParameters": null,
            "stageVariables": null,
            "requestContext": {
                "accountId": "123456789012",
                "resourceId": "abc123",
                "stage": "prod",
                "requestId": "c6af9ac6-7b61-11e6-9a41-93e8deadbeef",
                "identity": { "sourceIp": "127.0.0.1", "userAgent": "curl/8.0" },
                "resourcePath": path,
                "httpMethod": method,
                "apiId": "1234567890",
                "path": format!("/prod{}", path),
                "protocol": "HTTP/1.1",
                "requestTimeEpoch": 1700000000000_i64,
                "domainName": "api.example.com"
            },
            "body": null,
            "isBase64Encoded": false
        })
    }

    /// HTTP API (payload 2.0) event as sent by API Gateway
    pub(crate) fn http_api_event(method: &str, path: &str) -> serde_json::Value {
        json!({
            "version": "2.0",
            "routeKey": "$default",
            "rawPath": path,
            "rawQueryString": "",
            "headers": { "origin": "https://example.com", "accept": "application/json" },
            "requestContext": {
                "accountId": "123456789012",
                "apiId": "api-id",
                "domainName": "id.execute-api.eu-central-1.amazonaws.com",
                "domainPrefix": "id",
                "http": {
                    "method": method,
                    "path": path,
                    "protocol": "HTTP/1.1",
                    "sourceIp": "127.0.0.1",
                    "userAgent": "curl/8.0"
                },
                "requestId": "id",
                "routeKey": "$default",
                "stage": "$default",
                "time": "12/Mar/2020:19:03:58 +0000",
                "timeEpoch": 1583348638390_i64
            },
            "isBase64Encoded": false
        })
    }

    fn gateway(payload: serde_json::Value) -> GatewayRequest {
        match TriggerEvent::classify(payload).expect("Unable to parse gateway event") {
            TriggerEvent::Gateway(event) => event.into(),
            TriggerEvent::Other => panic!("expected gateway event"),
        }
    }

    #[test]
    fn rest_api_event_is_gateway() {
        let payload = rest_event("POST", "/api/counter");
        assert!(matches!(
            TriggerEvent::classify(payload.clone()),
            Ok(TriggerEvent::Gateway(GatewayEvent::Rest(_)))
        ));
        let request = gateway(payload);
        assert_eq!(request.method, http::Method::POST);
        assert_eq!(request.path, "/api/counter");
        assert_eq!(
            request.headers.get("origin").and_then(|v| v.to_str().ok()),
            Some("https://example.com")
        );
    }

    #[test]
    fn http_api_event_is_gateway() {
        let payload = http_api_event("GET", "/api/counter");
        assert!(matches!(
            TriggerEvent::classify(payload.clone()),
            Ok(TriggerEvent::Gateway(GatewayEvent::Http(_)))
        ));
        let request = gateway(payload);
        assert_eq!(request.method, http::Method::GET);
        assert_eq!(request.path, "/api/counter");
        assert!(request.headers.contains_key("origin"));
    }

    #[test]
    fn malformed_gateway_event_fails() {
        let payload = json!({ "httpMethod": 42, "requestContext": "nope" });
        assert!(TriggerEvent::classify(payload).is_err());
    }

    #[test]
    fn other_payloads_are_rejected() {
        for payload in [
            json!({ "view_count": 1 }),
            json!({ "source": "aws.events" }),
            json!("httpMethod"),
            json!(null),
        ] {
            assert!(matches!(
                TriggerEvent::classify(payload),
                Ok(TriggerEvent::Other)
            ));
        }
    }
}
