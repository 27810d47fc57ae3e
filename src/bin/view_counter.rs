use lambda_view_counter::counter::{CounterRunner, DynamoRunner, Handler};

struct Runner;

#[async_trait::async_trait]
impl CounterRunner for Runner {
    type Store = <DynamoRunner as CounterRunner>::Store;

    async fn setup(region: &str) -> anyhow::Result<Handler<Self::Store>> {
        use anyhow::Context;

        simple_logger::SimpleLogger::new()
            .with_level(log::LevelFilter::Info)
            .env()
            .init()
            .context("Unable to setup logging")?;
        <DynamoRunner as CounterRunner>::setup(region).await
    }
}

pub fn main() -> anyhow::Result<()> {
    lambda_view_counter::exec_tokio::<_, _, Runner, _>()
}
