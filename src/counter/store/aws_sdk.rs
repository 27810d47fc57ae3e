use super::{parse_counter, CounterStore, StoreFault, INCREMENT_EXPRESSION};
use crate::counter::Table;
use aws_sdk_dynamodb::config::retry::RetryConfig;
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};

/// Counter store backed by DynamoDB through the official aws sdk
#[derive(Clone)]
pub struct AwsSdkStore {
    client: aws_sdk_dynamodb::Client,
    table: Table,
}

impl std::fmt::Debug for AwsSdkStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsSdkStore")
            .field("client", &"[...]")
            .field("table", &self.table)
            .finish()
    }
}

impl AwsSdkStore {
    /// Create a new store, loading credentials and region from the environment.
    /// The client does not retry, a failed request is reported as it is.
    pub async fn new(table: Table) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let config = aws_sdk_dynamodb::config::Builder::from(&config)
            .retry_config(RetryConfig::disabled())
            .build();
        Self::with_client(aws_sdk_dynamodb::Client::from_conf(config), table)
    }

    /// Create a new store using an already configured client. Retries
    /// should be disabled on the client.
    pub fn with_client(client: aws_sdk_dynamodb::Client, table: Table) -> Self {
        Self { client, table }
    }

    fn key(&self) -> AttributeValue {
        AttributeValue::S(self.table.key_value.clone())
    }

    fn counter_of(
        &self,
        item: Option<&std::collections::HashMap<String, AttributeValue>>,
    ) -> Result<Option<u64>, StoreFault> {
        let attribute = &self.table.value_attribute;
        let value = match item.and_then(|item| item.get(attribute)) {
            Some(value) => value,
            None => return Ok(None),
        };
        let raw = value.as_n().map_err(|other| StoreFault::InvalidItem {
            attribute: attribute.clone(),
            value: format!("{:?}", other),
        })?;
        parse_counter(attribute, raw).map(Some)
    }
}

#[async_trait::async_trait]
impl CounterStore for AwsSdkStore {
    async fn get(&self) -> Result<Option<u64>, StoreFault> {
        let out = self
            .client
            .get_item()
            .table_name(&self.table.name)
            .key(&self.table.key_name, self.key())
            .consistent_read(true)
            .projection_expression("#value")
            .expression_attribute_names("#value", &self.table.value_attribute)
            .send()
            .await
            .map_err(fault)?;
        self.counter_of(out.item())
    }

    async fn increment(&self) -> Result<u64, StoreFault> {
        let out = self
            .client
            .update_item()
            .table_name(&self.table.name)
            .key(&self.table.key_name, self.key())
            .update_expression(INCREMENT_EXPRESSION)
            .expression_attribute_names("#value", &self.table.value_attribute)
            .expression_attribute_values(":one", AttributeValue::N("1".into()))
            .return_values(ReturnValue::UpdatedNew)
            .send()
            .await
            .map_err(fault)?;
        self.counter_of(out.attributes())?.ok_or_else(|| {
            StoreFault::Other(format!(
                "update of {} did not return attribute `{}`",
                self.table.name, self.table.value_attribute
            ))
        })
    }
}

fn fault<E, R>(err: SdkError<E, R>) -> StoreFault
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = DisplayErrorContext(&err).to_string();
    match err {
        SdkError::TimeoutError(_) => StoreFault::Timeout,
        SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            StoreFault::Transport(message)
        }
        SdkError::ServiceError(ref service) => match service.err().code() {
            Some("ThrottlingException" | "ProvisionedThroughputExceededException") => {
                StoreFault::Throttled(message)
            }
            Some("AccessDeniedException" | "UnrecognizedClientException") => {
                StoreFault::AccessDenied(message)
            }
            _ => StoreFault::Other(message),
        },
        _ => StoreFault::Other(message),
    }
}
