use clap::Parser;
use fixtures::{run_server, storage::StorageFixture, FixtureArgs};

/// Object storage fixture server
#[derive(Parser, Debug)]
#[clap(name = "storage-fixture")]
struct Cli {
    #[clap(flatten)]
    common: FixtureArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let app = StorageFixture::new().router();

    run_server(args.common, app).await
}
