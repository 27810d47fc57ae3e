//! Provides a view counter lambda served through an API Gateway.
//!
//! The counter is a single DynamoDB item. `GET /api/counter` reads it with a
//! strongly consistent read and `POST /api/counter` increments it with a single
//! atomic update, so concurrent invocations in different execution
//! environments never lose an update.
//!
//! # Usage
//!
//! With one of the store features enabled, [`DynamoRunner`] reads its
//! configuration from the environment (see [`Config::from_env`]):
//!
//! ```ignore
//! pub fn main() -> anyhow::Result<()> {
//!     lambda_view_counter::exec_tokio::<_, _, lambda_view_counter::counter::DynamoRunner, _>()
//! }
//! ```
//!
//! To use another store, or to setup logging beforehand, implement
//! [`CounterRunner`]:
//!
//! ```no_run
//! use lambda_view_counter::counter::{Cors, CounterRunner, Handler, MemoryStore};
//!
//! struct Runner;
//!
//! #[async_trait::async_trait]
//! impl CounterRunner for Runner {
//!     type Store = MemoryStore;
//!
//!     async fn setup(_region: &str) -> anyhow::Result<Handler<MemoryStore>> {
//!         // Setup logging to make sure that errors are printed
//!         Ok(Handler::new(MemoryStore::new(), Cors::default()))
//!     }
//! }
//!
//! pub fn main() -> anyhow::Result<()> {
//!     lambda_view_counter::exec_tokio::<_, _, Runner, _>()
//! }
//! ```
//!
//! For further details like deadline handling, refer to the main [documentation](`crate`)

mod config;
mod cors;
mod event;
mod handler;
mod service;
pub mod store;

pub use config::{Config, Table};
pub use cors::Cors;
pub use event::{GatewayEvent, GatewayRequest, HttpResponse, TriggerEvent};
pub use handler::Handler;
pub use service::Counter;
pub use store::{CounterStore, MemoryStore, StoreFault};

/// Defines a type which is executed every time the counter lambda
/// is invoked. Only the construction of the [`Handler`] is
/// customizable, request handling is always the same.
#[async_trait::async_trait]
pub trait CounterRunner {
    /// Store holding the counter
    type Store: CounterStore + 'static;

    /// See documentation of [`super::Runner::setup`]. Called once per
    /// execution environment, so configuration and clients created here
    /// are reused by all invocations.
    async fn setup(region: &str) -> anyhow::Result<Handler<Self::Store>>;
}

#[async_trait::async_trait]
impl<Type> super::Runner<Handler<Type::Store>, serde_json::Value, HttpResponse> for Type
where
    Type: 'static + CounterRunner,
{
    async fn setup(region: &str) -> anyhow::Result<Handler<Type::Store>> {
        <Type as CounterRunner>::setup(region).await
    }

    async fn run<'a>(
        shared: &'a Handler<Type::Store>,
        event: super::LambdaEvent<'a, serde_json::Value>,
    ) -> anyhow::Result<HttpResponse> {
        let response = shared.handle(event.event, event.deadline).await;
        log::info!("Responding with status {}", response.status_code);
        Ok(response)
    }
}

/// Runner storing the counter in DynamoDB. The backend is chosen by the
/// enabled feature, `store_aws_sdk` takes precedence over `store_rusoto`.
#[cfg(feature = "_store")]
#[cfg_attr(docsrs, doc(cfg(any(feature = "store_aws_sdk", feature = "store_rusoto"))))]
#[derive(Debug, Copy, Clone)]
pub struct DynamoRunner;

#[cfg(feature = "_store")]
#[async_trait::async_trait]
impl CounterRunner for DynamoRunner {
    #[cfg(feature = "store_aws_sdk")]
    type Store = store::AwsSdkStore;
    #[cfg(not(feature = "store_aws_sdk"))]
    type Store = store::RusotoStore;

    async fn setup(region: &str) -> anyhow::Result<Handler<Self::Store>> {
        let config = Config::from_env()?;
        log::info!(
            "Serving counter {}={} from table {} in {}",
            config.table.key_name,
            config.table.key_value,
            config.table.name,
            region
        );
        let store = dynamo_store(region, config.table).await?;
        Ok(Handler::new(store, Cors::new(config.allowed_origins)))
    }
}

#[cfg(feature = "store_aws_sdk")]
async fn dynamo_store(_region: &str, table: Table) -> anyhow::Result<store::AwsSdkStore> {
    Ok(store::AwsSdkStore::new(table).await)
}

#[cfg(all(feature = "store_rusoto", not(feature = "store_aws_sdk")))]
async fn dynamo_store(region: &str, table: Table) -> anyhow::Result<store::RusotoStore> {
    use anyhow::Context;
    use std::str::FromStr;

    let region = rusoto_core::Region::from_str(region).context("invalid region given to lambda")?;
    Ok(store::RusotoStore::new(region, table))
}
