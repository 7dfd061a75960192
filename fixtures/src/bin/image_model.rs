use clap::Parser;
use fixtures::{image_model::ImageModelFixture, run_server, FixtureArgs};

/// Image model fixture server
#[derive(Parser, Debug)]
#[clap(name = "image-model-fixture")]
struct Cli {
    #[clap(flatten)]
    common: FixtureArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let app = ImageModelFixture::new().router();

    run_server(args.common, app).await
}
