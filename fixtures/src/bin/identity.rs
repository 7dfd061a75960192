use clap::Parser;
use fixtures::{identity::IdentityFixture, run_server, FixtureArgs};

/// Identity provider fixture server
#[derive(Parser, Debug)]
#[clap(name = "identity-fixture")]
struct Cli {
    #[clap(flatten)]
    common: FixtureArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let app = IdentityFixture::default().router();

    run_server(args.common, app).await
}
