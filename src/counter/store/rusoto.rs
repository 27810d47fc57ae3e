use super::{parse_counter, CounterStore, StoreFault, INCREMENT_EXPRESSION};
use crate::counter::Table;
use std::collections::HashMap;

/// Counter store backed by DynamoDB through rusoto
#[derive(Clone)]
pub struct RusotoStore {
    client: rusoto_dynamodb::DynamoDbClient,
    table: Table,
}

impl std::fmt::Debug for RusotoStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RusotoStore")
            .field("client", &"[...]")
            .field("table", &self.table)
            .finish()
    }
}

impl RusotoStore {
    /// Create a new dynamodb client for the given region
    pub fn new(region: rusoto_core::Region, table: Table) -> Self {
        Self::with_client(rusoto_dynamodb::DynamoDbClient::new(region), table)
    }

    /// Create a new store using an already configured client
    pub fn with_client(client: rusoto_dynamodb::DynamoDbClient, table: Table) -> Self {
        Self { client, table }
    }

    fn key(&self) -> HashMap<String, rusoto_dynamodb::AttributeValue> {
        let mut key = HashMap::new();
        let _ = key.insert(
            self.table.key_name.clone(),
            rusoto_dynamodb::AttributeValue {
                s: Some(self.table.key_value.clone()),
                ..rusoto_dynamodb::AttributeValue::default()
            },
        );
        key
    }

    fn names(&self) -> HashMap<String, String> {
        let mut names = HashMap::new();
        let _ = names.insert("#value".into(), self.table.value_attribute.clone());
        names
    }

    fn counter_of(
        &self,
        item: Option<HashMap<String, rusoto_dynamodb::AttributeValue>>,
    ) -> Result<Option<u64>, StoreFault> {
        let attribute = &self.table.value_attribute;
        let value = match item.and_then(|mut item| item.remove(attribute)) {
            Some(value) => value,
            None => return Ok(None),
        };
        match value.n {
            Some(ref raw) => parse_counter(attribute, raw).map(Some),
            None => Err(StoreFault::InvalidItem {
                attribute: attribute.clone(),
                value: format!("{:?}", value),
            }),
        }
    }
}

#[async_trait::async_trait]
impl CounterStore for RusotoStore {
    async fn get(&self) -> Result<Option<u64>, StoreFault> {
        use rusoto_dynamodb::DynamoDb;

        let out = self
            .client
            .get_item(rusoto_dynamodb::GetItemInput {
                table_name: self.table.name.clone(),
                key: self.key(),
                consistent_read: Some(true),
                projection_expression: Some("#value".into()),
                expression_attribute_names: Some(self.names()),
                ..rusoto_dynamodb::GetItemInput::default()
            })
            .await
            .map_err(|err| {
                fault(err, |e| {
                    matches!(
                        e,
                        rusoto_dynamodb::GetItemError::ProvisionedThroughputExceeded(_)
                            | rusoto_dynamodb::GetItemError::RequestLimitExceeded(_)
                    )
                })
            })?;
        self.counter_of(out.item)
    }

    async fn increment(&self) -> Result<u64, StoreFault> {
        use rusoto_dynamodb::DynamoDb;

        let mut values = HashMap::new();
        let _ = values.insert(
            ":one".to_string(),
            rusoto_dynamodb::AttributeValue {
                n: Some("1".into()),
                ..rusoto_dynamodb::AttributeValue::default()
            },
        );
        let out = self
            .client
            .update_item(rusoto_dynamodb::UpdateItemInput {
                table_name: self.table.name.clone(),
                key: self.key(),
                update_expression: Some(INCREMENT_EXPRESSION.into()),
                expression_attribute_names: Some(self.names()),
                expression_attribute_values: Some(values),
                return_values: Some("UPDATED_NEW".into()),
                ..rusoto_dynamodb::UpdateItemInput::default()
            })
            .await
            .map_err(|err| {
                fault(err, |e| {
                    matches!(
                        e,
                        rusoto_dynamodb::UpdateItemError::ProvisionedThroughputExceeded(_)
                            | rusoto_dynamodb::UpdateItemError::RequestLimitExceeded(_)
                    )
                })
            })?;
        self.counter_of(out.attributes)?.ok_or_else(|| {
            StoreFault::Other(format!(
                "update of {} did not return attribute `{}`",
                self.table.name, self.table.value_attribute
            ))
        })
    }
}

/// Maps a rusoto error onto a [`StoreFault`]. Throttling and access errors
/// which are not modelled by the service error types arrive as unknown
/// responses and are detected by their body.
fn fault<E, F>(err: rusoto_core::RusotoError<E>, throttled: F) -> StoreFault
where
    E: std::error::Error + 'static,
    F: Fn(&E) -> bool,
{
    use rusoto_core::RusotoError;

    match err {
        RusotoError::Service(ref e) if throttled(e) => StoreFault::Throttled(err.to_string()),
        RusotoError::HttpDispatch(ref e) => StoreFault::Transport(e.to_string()),
        RusotoError::Credentials(ref e) => StoreFault::AccessDenied(e.to_string()),
        RusotoError::Unknown(rusoto_core::request::BufferedHttpResponse {
            ref status,
            ref body,
            ..
        }) => {
            let contains = |search: &[u8]| body.as_ref().windows(search.len()).any(|s| s == search);
            let message = String::from_utf8_lossy(body.as_ref()).into_owned();
            match status.as_u16() {
                400 if contains(b"ThrottlingException") => StoreFault::Throttled(message),
                429 => StoreFault::Throttled(message),
                400 | 403 if contains(b"AccessDenied") => StoreFault::AccessDenied(message),
                _ => StoreFault::Other(format!("{}: {}", status, message)),
            }
        }
        err => StoreFault::Other(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::{fault, RusotoStore};
    use crate::counter::event::tests::rest_event;
    use crate::counter::store::{CounterStore, StoreFault};
    use crate::counter::{Cors, Handler, Table};
    use rusoto_core::credential::CredentialsError;
    use rusoto_core::request::HttpDispatchError;
    use rusoto_core::signature::{SignedRequest, SignedRequestPayload};
    use rusoto_core::{Region, RusotoError};
    use rusoto_dynamodb::{DynamoDbClient, GetItemError};
    use rusoto_mock::{MockCredentialsProvider, MockRequestDispatcher};
    use serde_json::json;

    fn table() -> Table {
        Table {
            name: "counters".into(),
            key_name: "id".into(),
            key_value: "view_counter".into(),
            value_attribute: "views".into(),
        }
    }

    fn store(dispatcher: MockRequestDispatcher) -> RusotoStore {
        let client = DynamoDbClient::new_with(dispatcher, MockCredentialsProvider, Region::EuCentral1);
        RusotoStore::with_client(client, table())
    }

    /// Store answering every request with `status` and `body`
    fn respond(status: u16, body: &str) -> RusotoStore {
        store(MockRequestDispatcher::with_status(status).with_body(body))
    }

    /// Asserts operation and body of every request sent
    fn expect_request(
        target: &'static str,
        check: impl Fn(&serde_json::Value) + Send + Sync + 'static,
    ) -> impl Fn(&SignedRequest) + Send + Sync + 'static {
        move |request: &SignedRequest| {
            assert_eq!(
                request.headers.get("x-amz-target"),
                Some(&vec![target.as_bytes().to_vec()])
            );
            let body: serde_json::Value = match request.payload {
                Some(SignedRequestPayload::Buffer(ref body)) => {
                    serde_json::from_slice(body).expect("body is not json")
                }
                _ => panic!("request without buffered body"),
            };
            check(&body);
        }
    }

    fn service_error(code: &str) -> String {
        json!({
            "__type": format!("com.amazonaws.dynamodb.v20120810#{}", code),
            "message": "rejected"
        })
        .to_string()
    }

    #[tokio::test]
    async fn get_is_strongly_consistent() {
        let store = store(
            MockRequestDispatcher::with_status(200)
                .with_body(r#"{"Item":{"views":{"N":"7"}}}"#)
                .with_request_checker(expect_request("DynamoDB_20120810.GetItem", |body| {
                    assert_eq!(body["TableName"], "counters");
                    assert_eq!(body["Key"], json!({ "id": { "S": "view_counter" } }));
                    assert_eq!(body["ConsistentRead"], true);
                    assert_eq!(body["ExpressionAttributeNames"], json!({ "#value": "views" }));
                })),
        );
        assert_eq!(store.get().await.unwrap(), Some(7));
        assert_eq!(respond(200, "{}").get().await.unwrap(), None);
    }

    #[tokio::test]
    async fn increment_is_a_single_atomic_update() {
        let store = store(
            MockRequestDispatcher::with_status(200)
                .with_body(r#"{"Attributes":{"views":{"N":"8"}}}"#)
                .with_request_checker(expect_request("DynamoDB_20120810.UpdateItem", |body| {
                    assert_eq!(body["Key"], json!({ "id": { "S": "view_counter" } }));
                    assert_eq!(body["UpdateExpression"], "ADD #value :one");
                    assert_eq!(body["ExpressionAttributeNames"], json!({ "#value": "views" }));
                    assert_eq!(
                        body["ExpressionAttributeValues"],
                        json!({ ":one": { "N": "1" } })
                    );
                    assert_eq!(body["ReturnValues"], "UPDATED_NEW");
                })),
        );
        assert_eq!(store.increment().await.unwrap(), 8);
    }

    #[tokio::test]
    async fn error_responses_are_classified() {
        let cases: [(u16, String, fn(&StoreFault) -> bool); 6] = [
            (400, service_error("ThrottlingException"), |f| {
                matches!(f, StoreFault::Throttled(_))
            }),
            (400, service_error("ProvisionedThroughputExceededException"), |f| {
                matches!(f, StoreFault::Throttled(_))
            }),
            (429, "Too Many Requests".into(), |f| {
                matches!(f, StoreFault::Throttled(_))
            }),
            (400, service_error("AccessDeniedException"), |f| {
                matches!(f, StoreFault::AccessDenied(_))
            }),
            (403, service_error("AccessDeniedException"), |f| {
                matches!(f, StoreFault::AccessDenied(_))
            }),
            (500, service_error("InternalServerError"), |f| {
                matches!(f, StoreFault::Other(_))
            }),
        ];
        for (status, body, expected) in cases {
            let get = respond(status, &body).get().await.unwrap_err();
            assert!(expected(&get), "{} {} classified as {:?}", status, body, get);
            let increment = respond(status, &body).increment().await.unwrap_err();
            assert!(
                expected(&increment),
                "{} {} classified as {:?}",
                status,
                body,
                increment
            );
        }
    }

    #[test]
    fn client_errors_are_classified() {
        let err: RusotoError<GetItemError> =
            RusotoError::HttpDispatch(HttpDispatchError::new("connection reset".into()));
        assert!(matches!(fault(err, |_| false), StoreFault::Transport(_)));
        let err: RusotoError<GetItemError> =
            RusotoError::Credentials(CredentialsError::new("no credentials"));
        assert!(matches!(fault(err, |_| false), StoreFault::AccessDenied(_)));
        let err: RusotoError<GetItemError> = RusotoError::Validation("bad key".into());
        assert!(matches!(fault(err, |_| false), StoreFault::Other(_)));
    }

    #[tokio::test]
    async fn non_numeric_counter_is_invalid_item() {
        for body in [
            r#"{"Item":{"views":{"S":"five"}}}"#,
            r#"{"Item":{"views":{"N":"-1"}}}"#,
            r#"{"Item":{"views":{"N":"1.5"}}}"#,
        ] {
            assert!(matches!(
                respond(200, body).get().await,
                Err(StoreFault::InvalidItem { ref attribute, .. }) if attribute == "views"
            ));
        }
    }

    #[tokio::test]
    async fn invalid_item_is_internal_server_error() {
        let store = respond(200, r#"{"Attributes":{"views":{"S":"five"}}}"#);
        let handler = Handler::new(store, Cors::default());
        let response = handler
            .handle(rest_event("POST", "/api/counter"), None)
            .await;
        assert_eq!(response.status_code, 500);
        let body: serde_json::Value =
            serde_json::from_slice(response.body.as_deref().unwrap_or_default()).unwrap();
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Internal server error: counter attribute `views`"));
    }
}
