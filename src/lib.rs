//! This crate provides a view counter lambda function, served
//! through an API Gateway and backed by an atomic DynamoDB
//! counter, together with the runner used to execute it.
//!
//! # Counter lambda
//!
//! The [`counter`] module contains everything necessary to serve the
//! counter: the request handler, the CORS policy and the stores. With a
//! store feature enabled, the lambda is a single line:
//!
//! ```ignore
//! pub fn main() -> anyhow::Result<()> {
//!     lambda_view_counter::exec_tokio::<_, _, lambda_view_counter::counter::DynamoRunner, _>()
//! }
//! ```
//!
//! # Custom Runners
//!
//! The runner is not bound to the counter. Any type which implements [`Runner`]
//! can be used with [`exec`] or [`exec_tokio`], as long as types for events
//! implement [`serde::Deserialize`] and return types implement [`serde::Serialize`].
//!
//! ```no_run
//! #[derive(serde::Deserialize, Debug)]
//! struct Event {
//!     #[serde(flatten)]
//!     attributes: std::collections::HashMap<String, serde_json::Value>,
//! }
//!
//! #[derive(serde::Serialize, Debug)]
//! struct Return {
//!     data: std::borrow::Cow<'static, str>,
//! }
//!
//! struct Runner;
//!
//! #[async_trait::async_trait]
//! impl lambda_view_counter::Runner<(), Event, Return> for Runner {
//!     async fn run<'a>(
//!         _shared: &'a (),
//!         event: lambda_view_counter::LambdaEvent<'a, Event>,
//!     ) -> anyhow::Result<Return> {
//!         Ok(Return {
//!             data: event
//!                 .event
//!                 .attributes
//!                 .get("test")
//!                 .and_then(|a| a.as_str())
//!                 .map(ToOwned::to_owned)
//!                 .map(Into::into)
//!                 .unwrap_or_else(|| "none".into()),
//!         })
//!     }
//!
//!     async fn setup(_region: &str) -> anyhow::Result<()> {
//!         // Setup logging to make sure that errors are printed
//!         Ok(())
//!     }
//! }
//!
//! pub fn main() -> anyhow::Result<()> {
//!     lambda_view_counter::exec_tokio::<_, _, Runner, _>()
//! }
//! ```
//!
//! # Shared Data
//!
//! The value returned by [`Runner::setup`] is shared between all invocations
//! running in the same execution environment. Execution environments are
//! recycled at any time and many of them run in parallel, so shared data is
//! suited for clients and configuration, never for state which has to be
//! consistent across invocations. The counter itself therefore always lives
//! in the store.
//!
//! # Timeout handling
//!
//! Normally, if a lambda runs into a timeout, it will not create an error, which
//! then does not get propagated by `on_error` destinations.
//!
//! To fix that, a timeout handler is setup, which will "fail" 100 miliseconds before the lambda
//! would run into a timeout. The resulting deadline is also passed to the runner in
//! [`LambdaEvent::deadline`], which the counter uses to answer with a `500` response
//! before the invocation is failed.
//!

#![warn(
    absolute_paths_not_starting_with_crate,
    anonymous_parameters,
    deprecated_in_future,
    elided_lifetimes_in_paths,
    explicit_outlives_requirements,
    keyword_idents,
    macro_use_extern_crate,
    meta_variable_misuse,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    non_ascii_idents,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unsafe_code,
    unstable_features,
    unused_crate_dependencies,
    unused_extern_crates,
    unused_import_braces,
    unused_lifetimes,
    unused_qualifications,
    unused_results,
    variant_size_differences
)]
#![warn(
    clippy::correctness,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::cargo,
    clippy::nursery
)]
#![allow(clippy::multiple_crate_versions, clippy::future_not_send)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod counter;

#[cfg(any(test, feature = "binary"))]
use simple_logger as _;
#[cfg(test)]
use {aws_smithy_runtime as _, aws_smithy_runtime_api as _, aws_smithy_types as _, rusoto_mock as _};

/// Time before the lambda deadline at which an invocation is failed
const DEADLINE_MARGIN: std::time::Duration = std::time::Duration::from_millis(100);

/// Event passed to [`Runner::run`]
#[derive(Debug)]
pub struct LambdaEvent<'a, Event> {
    /// The payload sent to the lambda
    pub event: Event,
    /// Region the lambda is running in
    pub region: &'a str,
    /// Point in time at which the invocation is failed. `None` when
    /// running outside of lambda, e.g. with [`exec_test`]
    pub deadline: Option<tokio::time::Instant>,
}

/// Defines a type which is executed every time a lambda
/// is invoced.
///
/// Types:
/// * `Shared`: Type which is shared between lambda
///             invocations. Note that lambda will
///             create multiple environments for
///             simultaneous invocations and environments
///             are only kept alive for a certain time.
///             It is thus not guaranteed that data
///             can be reused, but with this types
///             its possible.
/// * `Event`:  The expected Event which is being send
///             to the lambda by AWS.
/// * `Return`: Type which is the result of the lamba
///             invocation being returned to AWS
#[async_trait::async_trait]
pub trait Runner<Shared, Event, Return>
where
    Shared: Send + Sync,
    Event: for<'de> serde::Deserialize<'de> + std::fmt::Debug + Send,
    Return: serde::Serialize,
{
    /// Invoked only once before lambda runtime start. Does not get called on each
    /// lambda invocation. Can be used to setup logging and other global services
    /// and creates the data shared between invocations, but should be short as it
    /// delays lambda startup
    async fn setup(region: &str) -> anyhow::Result<Shared>;

    /// Invoked for every lambda invocation. Data in `shared` is persisted between
    /// invocations as long as they are running in the same `execution environment`
    ///
    /// More Info: <https://docs.aws.amazon.com/lambda/latest/dg/runtimes-context.html>
    async fn run<'a>(shared: &'a Shared, event: LambdaEvent<'a, Event>) -> anyhow::Result<Return>;
}

/// Lambda entrypoint. This function sets up a lambda
/// multi-thread runtimes and executes [`exec`]. If you
/// already have your own runtime, use the [`exec`]
/// function.
///
/// Types:
/// * `Shared`: Data shared between invocations, see [`Runner`]
/// * `Event`:  The expected Event which is being send
///             to the lambda by AWS.
/// * `Run`:    Runner which is execued for each lambda
///             invocation.
/// * `Return`: Type which is the result of the lamba
///             invocation being returned to AWS
pub fn exec_tokio<Shared, Event, Run, Return>() -> anyhow::Result<()>
where
    Shared: Send + Sync,
    Event: for<'de> serde::Deserialize<'de> + std::fmt::Debug + Send,
    Run: Runner<Shared, Event, Return>,
    Return: serde::Serialize,
{
    use anyhow::Context;
    use tokio::runtime::Builder;

    Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Unable to build tokio runtime")?
        .block_on(exec::<Shared, Event, Run, Return>())
}

/// Lambda entrypoint. This function requires a
/// running tokio runtime. Alternativly use [`exec_tokio`]
/// which creates one.
///
/// Types:
/// * `Shared`: Data shared between invocations, see [`Runner`]
/// * `Event`:  The expected Event which is being send
///             to the lambda by AWS.
/// * `Run`:    Runner which is execued for each lambda
///             invocation.
/// * `Return`: Type which is the result of the lamba
///             invocation being returned to AWS
pub async fn exec<Shared, Event, Run, Return>() -> anyhow::Result<()>
where
    Shared: Send + Sync,
    Event: for<'de> serde::Deserialize<'de> + std::fmt::Debug + Send,
    Run: Runner<Shared, Event, Return>,
    Return: serde::Serialize,
{
    use anyhow::{anyhow, Context};
    use std::env;

    let region = env::var("AWS_REGION").context("Missing AWS_REGION env variable")?;
    let shared = Run::setup(&region).await?;
    log::info!("Starting lambda runtime");
    let region_ref = &region;
    let shared_ref = &shared;
    lambda_runtime::run(lambda_runtime::service_fn(
        move |data: lambda_runtime::LambdaEvent<Event>| async move {
            log::info!("Received lambda invocation with event: {:?}", data.payload);
            let deadline: u64 = data.context.deadline;
            run::<_, Event, Run, Return>(shared_ref, data.payload, Some(deadline), region_ref)
                .await
                .map_err(lambda_runtime::Error::from)
        },
    ))
    .await
    .map_err(|e| anyhow!(e))
}

async fn run<Shared, Event, Run, Return>(
    shared: &Shared,
    event: Event,
    deadline_in_ms: Option<u64>,
    region: &str,
) -> anyhow::Result<Return>
where
    Shared: Send + Sync,
    Event: for<'de> serde::Deserialize<'de> + std::fmt::Debug + Send,
    Run: Runner<Shared, Event, Return>,
    Return: serde::Serialize,
{
    use anyhow::anyhow;
    use futures::FutureExt;

    let deadline = deadline_in_ms.map(deadline_instant);
    let event = LambdaEvent {
        event,
        region,
        deadline,
    };
    let mut runner = Run::run(shared, event).fuse();
    let res = if let Some(deadline) = deadline {
        log::info!("Setting deadline to: {:?}", deadline);
        let mut timeout = Box::pin(tokio::time::sleep_until(deadline).fuse());
        futures::select! {
            res = runner => res,
            _ = timeout => Err(anyhow!("Lambda failed by running into a timeout")),
        }
    } else {
        runner.await
    };
    log::info!("Completed lambda invocation");
    match res {
        Ok(res) => Ok(res),
        Err(err) => {
            log::error!("{:?}", err);
            Err(err)
        }
    }
}

/// Converts the lambda deadline (milliseconds since epoch) into the
/// instant at which the invocation is failed
fn deadline_instant(deadline_in_ms: u64) -> tokio::time::Instant {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    let now_instant = tokio::time::Instant::now();
    let duration_from_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let duration_deadline = Duration::from_millis(deadline_in_ms)
        .saturating_sub(duration_from_epoch)
        .saturating_sub(DEADLINE_MARGIN);
    now_instant + duration_deadline
}

/// TestData which can be used to test lambda invocations
/// locally in combination with [`exec_test`].
#[derive(serde::Deserialize, Clone, Debug)]
pub struct TestData<Event> {
    /// Region passed to [`Runner::setup`] and [`Runner::run`]
    pub region: String,
    /// Events, invoked in order
    pub invocations: Vec<Event>,
}

/// Lambda entrypoint. This function can be used to
/// test one or multiple lambda invocations locally.
/// Returns the results of all invocations in order,
/// or the first error.
///
/// Types:
/// * `Shared`: Data shared between invocations, see [`Runner`]
/// * `Event`:  The expected Event which is being send
///             to the lambda by AWS.
/// * `Run`:    Runner which is execued for each lambda
///             invocation.
/// * `Return`: Type which is the result of the lamba
///             invocation being returned to AWS
pub fn exec_test<Shared, Event, Run, Return>(test_data: &str) -> anyhow::Result<Vec<Return>>
where
    Shared: Send + Sync,
    Event: for<'de> serde::Deserialize<'de> + std::fmt::Debug + Send,
    Run: Runner<Shared, Event, Return>,
    Return: serde::Serialize + std::fmt::Debug,
{
    use anyhow::Context;
    use tokio::runtime::Builder;

    log::info!("Creating tokio runtime");
    Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Unable to build tokio runtime")?
        .block_on(async {
            let test_data: TestData<Event> =
                serde_json::from_str(test_data).context("Unable to deserialize test_data")?;
            let shared = Run::setup(&test_data.region).await?;
            log::info!("Starting lambda test runtime");
            let shared_ref = &shared;
            let region_ref = &test_data.region;

            let mut results = Vec::with_capacity(test_data.invocations.len());
            for (i, data) in test_data.invocations.into_iter().enumerate() {
                log::info!("Invocation: {}", i);
                let res = run::<_, Event, Run, Return>(shared_ref, data, None, region_ref).await?;
                log::info!("{:?}", res);
                results.push(res);
            }
            Ok(results)
        })
}
