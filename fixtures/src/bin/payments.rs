use clap::Parser;
use fixtures::{payments::PaymentsFixture, require_env_var, run_server, FixtureArgs};

/// Payments fixture server
#[derive(Parser, Debug)]
#[clap(name = "payments-fixture")]
struct Cli {
    #[clap(flatten)]
    common: FixtureArgs,

    /// `price_id=cents` pairs the fixture will accept at checkout
    #[arg(long = "price", value_parser = parse_price)]
    prices: Vec<(String, i64)>,
}

fn parse_price(raw: &str) -> Result<(String, i64), String> {
    let (id, amount) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected price_id=cents, got {raw}"))?;
    let amount = amount
        .parse::<i64>()
        .map_err(|e| format!("invalid amount in {raw}: {e}"))?;
    Ok((id.to_string(), amount))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    // Public URL of this fixture, used for the hosted checkout links
    let public_url = require_env_var("PAYMENTS_URL", args.common.force)?;
    let webhook_secret = require_env_var("PAYMENTS_WEBHOOK_SECRET", args.common.force)?;

    let fixture = PaymentsFixture::new(&webhook_secret);
    fixture.set_public_url(&public_url);
    for (price_id, amount) in &args.prices {
        fixture.add_price(price_id, *amount);
    }

    run_server(args.common, fixture.router()).await
}
