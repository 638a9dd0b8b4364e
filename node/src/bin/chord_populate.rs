use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use chord_lib::dataset::DatasetBuilder;
use chord_node::{DhtRequest, DhtResponse, Direction, Envelope, NetworkClient, RealNetworkClient, RpcError};
use clap::Parser;
use env_logger::Env;
use log::info;

/// Loads a CSV file into the ring through one of its nodes.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Port of any node in the ring
    port: u16,

    /// CSV file; the first line is a header
    file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let text = tokio::fs::read_to_string(&cli.file).await?;
    let builder = DatasetBuilder::from_csv(&text);
    info!(
        "Read {} rows under {} keys from {} ({} skipped)",
        builder.rows(),
        builder.keys(),
        cli.file.display(),
        builder.skipped()
    );

    let address = SocketAddr::from((Ipv4Addr::LOCALHOST, cli.port));
    let request = DhtRequest::Populate {
        dataset: builder.finish(),
        direction: Direction::Both,
    };
    match RealNetworkClient::default()
        .call_node(address, Envelope::external(request))
        .await?
    {
        DhtResponse::Ack(node) => {
            info!("Dataset accepted by {}", node);
            Ok(())
        }
        other => Err(RpcError::unexpected("Populate", other).into()),
    }
}
