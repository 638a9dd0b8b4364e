use chord_node::Config;
use clap::Parser;
use env_logger::Env;

#[derive(Parser, Debug)]
#[command(author, version, about = "Run one node of a Chord ring", long_about = None)]
struct Cli {
    /// Port of a node already in the ring, or 0 to start a new ring
    existing_port: u16,

    /// Port to listen on; 0 picks a free one
    #[arg(long, default_value_t = 0)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = Config {
        port: cli.port,
        bootstrap_port: (cli.existing_port != 0).then_some(cli.existing_port),
        ..Config::default()
    };
    chord_node::start(config).await?;
    Ok(())
}
