#![allow(dead_code)]

use lambda_view_counter::counter::HttpResponse;
use serde_json::{json, Value};

/// REST API (payload format 1.0) event
pub fn rest(method: &str, path: &str, origin: &str) -> Value {
    json!({
        "resource": path,
        "path": path,
        "httpMethod": method,
        "headers": { "Origin": origin, "Accept": "application/json" },
        "multiValueHeaders": { "Origin": [origin], "Accept": ["application/json"] },
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

/// HTTP API (payload format 2.0) event
pub fn http_api(method: &str, path: &str, origin: &str) -> Value {
    json!({
        "version": "2.0",
        "routeKey": "$default",
        "rawPath": path,
        "rawQueryString": "",
        "headers": { "origin": origin, "accept": "application/json" },
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

pub fn header<'r>(response: &'r HttpResponse, name: &str) -> Option<&'r str> {
    response.headers.get(name).and_then(|v| v.to_str().ok())
}

pub fn text_body(response: &HttpResponse) -> &str {
    std::str::from_utf8(response.body.as_deref().unwrap_or_default()).expect("Body is not utf-8")
}

pub fn json_body(response: &HttpResponse) -> Value {
    serde_json::from_str(text_body(response)).expect("Body is not json")
}
