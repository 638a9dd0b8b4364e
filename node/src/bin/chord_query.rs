use std::net::{Ipv4Addr, SocketAddr};

use chord_lib::dataset::record_key;
use chord_node::{DhtRequest, DhtResponse, Direction, Envelope, NetworkClient, RealNetworkClient, RpcError};
use clap::Parser;
use env_logger::Env;
use log::debug;

/// Looks up the records filed under a key: the first and fourth CSV columns.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Port of any node in the ring
    port: u16,

    /// Value of the first column, e.g. a player id
    first: String,

    /// Value of the fourth column, e.g. a year
    fourth: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let id = record_key(&cli.first, &cli.fourth);
    debug!("Querying key {}", id);

    let address = SocketAddr::from((Ipv4Addr::LOCALHOST, cli.port));
    let request = DhtRequest::FindKey {
        id,
        direction: Direction::Both,
    };
    match RealNetworkClient::default()
        .call_node(address, Envelope::external(request))
        .await?
    {
        DhtResponse::Records(Some(records)) => {
            println!("{}", serde_json::to_string_pretty(&records)?);
            Ok(())
        }
        DhtResponse::Records(None) => {
            println!("No records found for {} {}", cli.first, cli.fourth);
            Ok(())
        }
        other => Err(RpcError::unexpected("FindKey", other).into()),
    }
}
