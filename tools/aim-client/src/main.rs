//! aim-client: sign and send AIM calls from the command line.

use std::path::PathBuf;
use std::process::ExitCode;

use aim_01_protocol::{parse_signing_key, Address, CallOptions, ProtocolVersion, RequestSigner};
use aim_client::{discover_nodes, parse_header_json, AimClient, ClientConfig, NodeResponse};
use clap::{Args, Parser, Subcommand, ValueEnum};

/// aim-client: AIM command-line client
#[derive(Parser, Debug)]
#[command(name = "aim-client")]
#[command(about = "Sign Protocol V2 calls and inspect AIM manifest, queue and job state")]
struct Cli {
    /// JSON client config (seed_hosts, driver, pk)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the canonical message, signer address and headers for a call
    Sign {
        #[command(flatten)]
        target: Target,
        #[command(flatten)]
        call: CallArgs,
    },
    /// Sign and send a call
    Call {
        #[command(flatten)]
        target: Target,
        #[command(flatten)]
        call: CallArgs,
    },
    /// Fetch the service manifest
    Manifest {
        #[command(flatten)]
        target: Target,
    },
    /// Fetch queue status (public call)
    Queue {
        #[command(flatten)]
        target: Target,
    },
    /// Fetch a ticket's state and result (signed call)
    Job {
        #[command(flatten)]
        target: Target,
        /// Ticket number
        number: u64,
        #[command(flatten)]
        call: CallArgs,
    },
    /// List nodes known to the configured seed hosts
    ListNodes,
    /// Fetch a node's description
    NodeInfo {
        /// Node address (host:port or URL)
        #[arg(short, long, default_value = "127.0.0.1:8000")]
        node: String,
    },
    /// Fetch the balance an address holds on a node
    GetBalance {
        /// Node address (host:port or URL)
        #[arg(short, long, default_value = "127.0.0.1:8000")]
        node: String,
        /// Address to query; derived from the private key when omitted
        #[arg(long)]
        address: Option<Address>,
        /// Hex private key
        #[arg(long, env = "AIM_PRIVATE_KEY", hide_env_values = true)]
        pk: Option<String>,
        /// Payment driver [default: from config, else ethereum]
        #[arg(long)]
        driver: Option<String>,
    },
    /// Print the address of a private key
    Address {
        /// Hex private key
        #[arg(long, env = "AIM_PRIVATE_KEY", hide_env_values = true)]
        pk: String,
    },
}

#[derive(Args, Debug)]
struct Target {
    /// Node address (host:port or URL)
    #[arg(short, long, default_value = "127.0.0.1:8000")]
    node: String,

    /// AIM slot on the node
    #[arg(short, long, default_value = "0")]
    slot: String,
}

#[derive(Args, Debug)]
struct CallArgs {
    /// Endpoint uri inside the slot
    #[arg(long, default_value = "/")]
    uri: String,

    /// HTTP method
    #[arg(short, long, default_value = "GET")]
    method: String,

    /// Hex private key
    #[arg(long, env = "AIM_PRIVATE_KEY", hide_env_values = true)]
    pk: Option<String>,

    /// Replay nonce; fetched from the node when omitted
    #[arg(long)]
    nonce: Option<String>,

    /// Signature scheme
    #[arg(long, value_enum, default_value = "2")]
    protocol_version: VersionArg,

    /// Payment driver [default: from config, else ethereum]
    #[arg(long)]
    driver: Option<String>,

    /// Currency announced in `currency-type`
    #[arg(long, default_value = "USDC")]
    currency: String,

    /// Ask for a price estimate instead of running the endpoint
    #[arg(long)]
    cost_only: bool,

    /// Send unsigned
    #[arg(long)]
    is_public: bool,

    /// Extra headers as a JSON object
    #[arg(long)]
    headers: Option<String>,

    /// Request body
    #[arg(long)]
    body: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum VersionArg {
    #[value(name = "1")]
    V1,
    #[value(name = "2")]
    V2,
}

impl From<VersionArg> for ProtocolVersion {
    fn from(v: VersionArg) -> Self {
        match v {
            VersionArg::V1 => ProtocolVersion::V1,
            VersionArg::V2 => ProtocolVersion::V2,
        }
    }
}

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match ClientConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    match run(cli.command, &config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the node answered with a success status.
async fn run(command: Command, config: &ClientConfig) -> CliResult<bool> {
    match command {
        Command::ListNodes => {
            let nodes = discover_nodes(&config.seed_hosts).await?;
            if nodes.is_empty() {
                println!("No nodes found");
            }
            for node in nodes {
                match node {
                    serde_json::Value::String(node) => println!("{}", node),
                    other => println!("{}", other),
                }
            }
            Ok(true)
        }
        Command::NodeInfo { node } => {
            let client = AimClient::new(&node)?;
            let response = client.node_info().await?;
            Ok(print_response(&response))
        }
        Command::GetBalance {
            node,
            address,
            pk,
            driver,
        } => {
            let address = match (address, pk.or_else(|| config.pk.clone())) {
                (Some(address), _) => address,
                (None, Some(pk)) => RequestSigner::new(parse_signing_key(&pk)?).address(),
                (None, None) => return Err("either --address or --pk is required".into()),
            };
            let driver = driver.unwrap_or_else(|| config.driver.clone());
            let client = AimClient::new(&node)?;
            println!("Balance for {}:", address);
            let response = client.balance(&address, &driver).await?;
            Ok(print_response(&response))
        }
        Command::Address { pk } => {
            let key = parse_signing_key(&pk)?;
            println!("{}", RequestSigner::new(key).address());
            Ok(true)
        }
        Command::Sign { target, call } => {
            let client = AimClient::new(&target.node)?;
            let signed = prepare(&client, config, &target, &call, &call.uri).await?;
            if let Some(address) = &signed.address {
                println!("Signer: {}", address);
            }
            println!("{} {}{}", signed.call.method, client.base_url(), signed.call.path);
            if let Some(message) = &signed.call.message {
                println!("\nCanonical message:\n{}", message.as_str());
            }
            println!("\nHeaders:");
            for (name, value) in &signed.call.headers {
                println!("  {}: {}", name, value);
            }
            Ok(true)
        }
        Command::Call { target, call } => {
            let client = AimClient::new(&target.node)?;
            let signed = prepare(&client, config, &target, &call, &call.uri).await?;
            let response = client.send(&signed.call).await?;
            Ok(print_response(&response))
        }
        Command::Job {
            target,
            number,
            call,
        } => {
            let client = AimClient::new(&target.node)?;
            let uri = format!("/jobs/{number}");
            let mut call = call;
            call.method = "GET".into();
            let signed = prepare(&client, config, &target, &call, &uri).await?;
            let response = client.send(&signed.call).await?;
            Ok(print_response(&response))
        }
        Command::Manifest { target } => {
            let client = AimClient::new(&target.node)?;
            let response = client
                .get(&format!("/aim/{}/manifest.json", target.slot))
                .await?;
            Ok(print_response(&response))
        }
        Command::Queue { target } => {
            let client = AimClient::new(&target.node)?;
            let response = client.get(&format!("/aim/{}/queue", target.slot)).await?;
            Ok(print_response(&response))
        }
    }
}

struct Prepared {
    address: Option<String>,
    call: aim_01_protocol::SignedCall,
}

async fn prepare(
    client: &AimClient,
    config: &ClientConfig,
    target: &Target,
    args: &CallArgs,
    uri: &str,
) -> CliResult<Prepared> {
    let mut options = CallOptions::new(args.method.as_str(), target.slot.as_str(), uri);
    options.version = args.protocol_version.into();
    options.driver = args
        .driver
        .clone()
        .unwrap_or_else(|| config.driver.clone());
    options.currency = args.currency.clone();
    options.cost_only = args.cost_only;
    options.is_public = args.is_public;
    options.body = args.body.as_ref().map(|b| b.as_bytes().to_vec());
    if let Some(raw) = &args.headers {
        options.extra_headers = parse_header_json(raw)?;
    }

    let Some(pk) = args.pk.as_ref().or(config.pk.as_ref()) else {
        if !args.is_public {
            return Err("a private key is required unless --is-public is set".into());
        }
        // Public calls carry no sender headers.
        let mut headers = options.extra_headers.clone();
        headers.push(("isPublic".into(), "1".into()));
        return Ok(Prepared {
            address: None,
            call: aim_01_protocol::SignedCall {
                method: options.method.to_ascii_uppercase(),
                path: options.path(),
                headers,
                message: None,
                signature: None,
                body: options.body,
            },
        });
    };

    let signer = RequestSigner::new(parse_signing_key(pk)?);
    if !args.is_public {
        options.nonce = match &args.nonce {
            Some(nonce) => Some(nonce.clone()),
            None => Some(client.fetch_nonce(&signer.address()).await?),
        };
    }

    Ok(Prepared {
        address: Some(signer.address().to_string()),
        call: signer.sign_call(&options)?,
    })
}

fn print_response(response: &NodeResponse) -> bool {
    println!("Status: {}", response.status);
    for (name, value) in &response.headers {
        if matches!(name.as_str(), "cost_used" | "currency") {
            println!("{}: {}", name, value);
        }
    }
    match response.json() {
        Some(json) => match serde_json::to_string_pretty(&json) {
            Ok(pretty) => println!("{}", pretty),
            Err(_) => println!("{}", response.body),
        },
        None => println!("{}", response.body),
    }
    response.is_success()
}
