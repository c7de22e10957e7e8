//! ChainEvents CLI — decode, filter, and watch EVM contract events.
//!
//! # Commands
//! ```
//! chainevents events     --abi <path.json>
//! chainevents decode-log --abi <path.json> --event <Name> --topics <...> --data <hex>
//! chainevents filter     --abi <path.json> --event <Name> --rpc <url> [--from-block N] [--to-block N]
//! chainevents watch      --abi <path.json> --event <Name> --rpc <url> --ws <url>
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use chainevents_core::{
    event::{DecodedEvent, RawLog},
    registry::MemoryRegistry,
    schema::SchemaRegistry,
};
use chainevents_evm::{abi_events, EvmEventDecoder};
use chainevents_stream::{BlockRange, EventClient, RpcBackend, TopicFilter};

#[derive(Parser)]
#[command(
    name = "chainevents",
    about = "Typed EVM event log filtering, decoding, and subscription",
    long_about = "
ChainEvents CLI: decode historical and live EVM event logs against a
contract ABI. Built on alloy-rs.

ENVIRONMENT VARIABLES:
  RUST_LOG    tracing filter, e.g. 'info,chainevents_stream=debug'
",
    version
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the event schemas declared in an ABI file
    Events {
        /// Path to the contract ABI JSON
        #[arg(long)]
        abi: PathBuf,
    },

    /// Decode a single event log from raw topics + data
    #[command(name = "decode-log")]
    DecodeLog {
        /// Path to the contract ABI JSON
        #[arg(long)]
        abi: PathBuf,
        /// Event name to decode against
        #[arg(long)]
        event: String,
        /// topics[0] = signature hash, topics[1..] = indexed params
        #[arg(long, num_args = 1..)]
        topics: Vec<String>,
        /// Non-indexed params (hex, 0x-prefixed)
        #[arg(long, default_value = "0x")]
        data: String,
        /// Emitting contract address
        #[arg(long, default_value = "0x0000000000000000000000000000000000000000")]
        address: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Query a historical block window and print matching events
    Filter {
        /// Path to the contract ABI JSON
        #[arg(long)]
        abi: PathBuf,
        /// Event name to filter
        #[arg(long)]
        event: String,
        /// HTTP JSON-RPC endpoint
        #[arg(long)]
        rpc: String,
        /// Contract address filter (repeatable; empty = any)
        #[arg(long)]
        address: Vec<String>,
        /// First block of the window (default: node's earliest)
        #[arg(long)]
        from_block: Option<u64>,
        /// Last block of the window (default: latest)
        #[arg(long)]
        to_block: Option<u64>,
        /// Constraint on the first indexed param (repeatable; OR-ed)
        #[arg(long)]
        topic1: Vec<String>,
        /// Constraint on the second indexed param
        #[arg(long)]
        topic2: Vec<String>,
        /// Constraint on the third indexed param
        #[arg(long)]
        topic3: Vec<String>,
        /// Output as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Subscribe to future events and print them until interrupted
    Watch {
        /// Path to the contract ABI JSON
        #[arg(long)]
        abi: PathBuf,
        /// Event name to watch
        #[arg(long)]
        event: String,
        /// HTTP JSON-RPC endpoint
        #[arg(long)]
        rpc: String,
        /// WebSocket JSON-RPC endpoint
        #[arg(long)]
        ws: String,
        /// Contract address filter (repeatable; empty = any)
        #[arg(long)]
        address: Vec<String>,
        /// Constraint on the first indexed param (repeatable; OR-ed)
        #[arg(long)]
        topic1: Vec<String>,
        /// Constraint on the second indexed param
        #[arg(long)]
        topic2: Vec<String>,
        /// Constraint on the third indexed param
        #[arg(long)]
        topic3: Vec<String>,
        /// Output as JSON lines
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Events { abi } => cmd_events(&abi),
        Commands::DecodeLog {
            abi,
            event,
            topics,
            data,
            address,
            json,
        } => cmd_decode_log(&abi, &event, topics, &data, address, json),
        Commands::Filter {
            abi,
            event,
            rpc,
            address,
            from_block,
            to_block,
            topic1,
            topic2,
            topic3,
            json,
        } => {
            let client = build_client(&abi, &rpc, None, address)?;
            cmd_filter(
                &client,
                &event,
                topic_filter(topic1, topic2, topic3),
                BlockRange::new(from_block, to_block),
                json,
            )
            .await
        }
        Commands::Watch {
            abi,
            event,
            rpc,
            ws,
            address,
            topic1,
            topic2,
            topic3,
            json,
        } => {
            let client = build_client(&abi, &rpc, Some(&ws), address)?;
            cmd_watch(&client, &event, topic_filter(topic1, topic2, topic3), json).await
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_registry(abi: &PathBuf) -> Result<MemoryRegistry> {
    let json = std::fs::read_to_string(abi)
        .with_context(|| format!("failed to read ABI file {}", abi.display()))?;
    let schemas = abi_events(&json).context("failed to parse ABI")?;
    if schemas.is_empty() {
        bail!("ABI declares no events: {}", abi.display());
    }
    let registry = MemoryRegistry::new();
    registry.extend(schemas).context("duplicate event in ABI")?;
    Ok(registry)
}

fn build_client(
    abi: &PathBuf,
    rpc: &str,
    ws: Option<&str>,
    addresses: Vec<String>,
) -> Result<EventClient> {
    let registry = load_registry(abi)?;
    let mut backend = RpcBackend::new(rpc).context("invalid --rpc endpoint")?;
    if let Some(ws) = ws {
        backend = backend.with_ws_url(ws).context("invalid --ws endpoint")?;
    }
    let mut client = EventClient::new(
        Arc::new(backend),
        Arc::new(registry),
        Arc::new(EvmEventDecoder::new()),
    );
    for address in addresses {
        client = client.with_address(address);
    }
    Ok(client)
}

fn topic_filter(topic1: Vec<String>, topic2: Vec<String>, topic3: Vec<String>) -> TopicFilter {
    TopicFilter::new()
        .topic(0, topic1)
        .topic(1, topic2)
        .topic(2, topic3)
}

fn cmd_events(abi: &PathBuf) -> Result<()> {
    let registry = load_registry(abi)?;
    for name in registry.names() {
        let schema = registry
            .get_by_name(&name)
            .context("registry lost a schema it just listed")?;
        let tag = if schema.anonymous { " (anonymous)" } else { "" };
        println!("{}  {}{}", schema.fingerprint(), schema.signature(), tag);
    }
    Ok(())
}

fn cmd_decode_log(
    abi: &PathBuf,
    event: &str,
    topics: Vec<String>,
    data: &str,
    address: String,
    json: bool,
) -> Result<()> {
    let registry = load_registry(abi)?;
    let schema = registry
        .get_by_name(event)
        .with_context(|| format!("event '{event}' not in ABI"))?;

    let data = hex::decode(data.strip_prefix("0x").unwrap_or(data))
        .context("invalid --data hex")?;
    let raw = RawLog {
        address,
        topics,
        data,
        block_number: 0,
        block_hash: None,
        tx_hash: "0x0".into(),
        tx_index: 0,
        log_index: 0,
        removed: false,
    };

    use chainevents_core::decoder::EventDecoder;
    let decoded = EvmEventDecoder::new()
        .decode(&raw, &schema)
        .context("decode failed")?;
    print_event(&decoded, json)?;
    Ok(())
}

async fn cmd_filter(
    client: &EventClient,
    event: &str,
    topics: TopicFilter,
    range: BlockRange,
    json: bool,
) -> Result<()> {
    let mut iter = client
        .filter_events(event, topics, range)
        .await
        .context("historical query failed")?;

    let mut count = 0usize;
    while iter.advance().await {
        if let Some(decoded) = iter.current() {
            print_event(decoded, json)?;
            count += 1;
        }
    }
    if let Some(err) = iter.error() {
        bail!("iteration failed after {count} events: {err}");
    }
    tracing::info!(count, event, "filter complete");
    Ok(())
}

async fn cmd_watch(
    client: &EventClient,
    event: &str,
    topics: TopicFilter,
    json: bool,
) -> Result<()> {
    let handle = client
        .watch_events(event, topics, move |decoded: DecodedEvent| {
            // Sink errors only come from stdout; nothing useful to do.
            let _ = print_event(&decoded, json);
        })
        .await
        .context("subscription failed")?;
    let close = handle.close_handle();

    tokio::select! {
        outcome = handle.join() => {
            if let Some(err) = outcome {
                bail!("watch failed: {err}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            close.close();
            tracing::info!("interrupted, subscription released");
        }
    }
    Ok(())
}

fn print_event(event: &DecodedEvent, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
    } else {
        let fields: Vec<String> = event
            .fields
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        println!(
            "block {:>9}  log {:>3}  {}  {}({})",
            event.block_number(),
            event.log_index(),
            event.tx_hash(),
            event.event,
            fields.join(", ")
        );
    }
    Ok(())
}
