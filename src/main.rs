// src/main.rs
use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use ethers::types::{Address, Bytes, U256};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use magmar_aa::{CallIntent, ClientOptions, DirectClient, OwnerCredential, PaymasterKind};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(long)]
    api_key: String,

    #[clap(short, long)]
    chain_id: u64,

    #[clap(short, long)]
    eth_rpc_url: String,

    #[clap(short, long)]
    private_key: String,

    #[clap(long)]
    sponsored: bool,

    #[clap(long)]
    paymaster: Option<PaymasterKind>,

    #[clap(long)]
    paymaster_endpoint: Option<String>,

    #[clap(long)]
    paymaster_id: Option<String>,

    /// ERC-20 token the MAGMAR paymaster charges instead of sponsoring
    #[clap(long)]
    erc20_token: Option<String>,

    #[clap(long)]
    bundler_endpoint: Option<String>,

    /// Deploy the account through init code instead of backend sponsorship
    #[clap(long)]
    no_account_create_sponsorship: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the smart-account address owned by the private key
    Address,
    /// Send one call through the smart account
    Send {
        #[clap(long)]
        target: String,

        /// Hex-encoded calldata
        #[clap(long, default_value = "0x")]
        data: String,

        /// Value in wei
        #[clap(long)]
        value: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let mut options = ClientOptions::new(args.chain_id, args.eth_rpc_url);
    options.sponsored = args.sponsored;
    options.paymaster = args.paymaster;
    options.paymaster_endpoint = args.paymaster_endpoint;
    options.paymaster_id = args.paymaster_id;
    options.bundler_endpoint = args.bundler_endpoint;
    options.no_account_create_sponsorship = args.no_account_create_sponsorship;
    if let Some(token) = args.erc20_token {
        let token: Address = token
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid erc20 token address: {e}"))?;
        options.erc20_token = Some(token);
    }

    let client = DirectClient::init(
        &args.api_key,
        options,
        OwnerCredential::PrivateKey(args.private_key),
    )
    .await?;

    match args.command {
        Command::Address => {
            println!("{:?}", client.account_address());
        }
        Command::Send {
            target,
            data,
            value,
        } => {
            let target: Address = target
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid target address: {e}"))?;
            let data = hex::decode(data.trim_start_matches("0x")).context("invalid calldata")?;
            let mut intent = CallIntent::new(target, Bytes::from(data));
            if let Some(value) = value {
                let value = U256::from_dec_str(&value)
                    .map_err(|e| anyhow::anyhow!("invalid value: {e}"))?;
                intent = intent.with_value(value);
            }

            let outcome = client.send(intent).await?;
            info!("User operation {:?} submitted", outcome.user_op_hash);
            match outcome.transaction_hash {
                Some(tx) => println!("{:?} {:?}", outcome.user_op_hash, tx),
                None => println!("{:?}", outcome.user_op_hash),
            }
        }
    }

    Ok(())
}
