//! kadseek CLI
//!
//! Keyword search over the eMule KAD network, printing ed2k links

mod config;
mod progress;

use anyhow::Context;
use clap::{Parser, Subcommand};
use console::style;
use kadseek_proto::{KadId, load_nodes_dat};
use kadseek_search::{
    FileKind, FileLink, KadService, SearchOutcome, await_results, detect_local_ip, ed2k_link,
};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;

use config::Config;
use progress::{SearchProgress, format_bytes, format_duration};

/// kadseek - find files on the KAD network
#[derive(Parser)]
#[command(name = "kadseek")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the network for keywords
    Search {
        /// Keywords; each is searched separately
        #[arg(required = true)]
        keywords: Vec<String>,

        /// nodes.dat used to seed the search
        #[arg(short, long)]
        nodes: Option<PathBuf>,

        /// Seconds to wait for each further batch of results
        #[arg(short, long)]
        wait: Option<u64>,

        /// Print one JSON object per result
        #[arg(long)]
        json: bool,
    },

    /// Print the ed2k link for a file
    Link {
        /// File name
        name: String,

        /// Size in bytes
        size: u64,

        /// Content hash in KAD byte order (32 hex digits)
        hash: String,
    },

    /// List the contacts in a nodes.dat file
    Nodes {
        /// File to read (defaults to the configured one)
        file: Option<PathBuf>,
    },

    /// Show a fresh local identity
    Id {
        /// Also print the UDP verify key for this peer address
        #[arg(long)]
        peer: Option<Ipv4Addr>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::load_or_default()?,
    };
    config.validate()?;

    // Initialize logging
    let level = if cli.verbose {
        "debug".to_string()
    } else {
        config.logging.level.to_lowercase()
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(level))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Search {
            keywords,
            nodes,
            wait,
            json,
        } => {
            run_search(keywords, nodes, wait, json, &config).await?;
        }
        Commands::Link { name, size, hash } => {
            print_link(&name, size, &hash)?;
        }
        Commands::Nodes { file } => {
            list_nodes(file.unwrap_or_else(|| config.network.nodes_file.clone()))?;
        }
        Commands::Id { peer } => {
            show_identity(peer, &config).await?;
        }
    }

    Ok(())
}

/// Run a keyword search and print every link as it arrives
async fn run_search(
    keywords: Vec<String>,
    nodes: Option<PathBuf>,
    wait: Option<u64>,
    json: bool,
    config: &Config,
) -> anyhow::Result<()> {
    let local_ip = detect_local_ip().await.context("cannot determine local identity")?;
    let prefs = config.prefs(local_ip);
    tracing::info!(
        kad_id = %prefs.kad_id,
        local_ip = %prefs.local_ip,
        public_ip = %prefs.public_ip(),
        tcp_port = prefs.tcp_port,
        "local identity"
    );

    let nodes_file = nodes.unwrap_or_else(|| config.network.nodes_file.clone());
    let contacts = load_nodes_dat(&nodes_file)
        .with_context(|| format!("failed to read {}", nodes_file.display()))?;
    if contacts.is_empty() {
        anyhow::bail!("{} contains no usable contacts", nodes_file.display());
    }
    tracing::info!(contacts = contacts.len(), file = %nodes_file.display(), "loaded contacts");

    let service_config = config.service_config();
    let bind = SocketAddr::from((Ipv4Addr::UNSPECIFIED, service_config.udp_port));
    let socket = UdpSocket::bind(bind)
        .await
        .with_context(|| format!("failed to bind UDP {bind}"))?;

    let (service, handle, cmd_rx) = KadService::new(service_config);
    let task = tokio::spawn(service.run(socket, cmd_rx));

    handle.add_contacts(contacts).await?;
    let mut rx = handle.search(keywords.clone()).await?;

    let started = Instant::now();
    let progress = SearchProgress::new(&keywords);
    let idle = wait.map_or_else(|| config.result_wait(), Duration::from_secs);
    let mut shown = 0usize;

    let outcome = await_results(&mut rx, idle, |link| {
        shown += 1;
        progress.found(shown);
        if json {
            match link.to_json() {
                Ok(line) => progress.println(line),
                Err(err) => tracing::warn!(error = %err, "failed to render result"),
            }
        } else {
            progress.println(render_link(link));
        }
    })
    .await;

    let elapsed = format_duration(started.elapsed());
    match outcome {
        SearchOutcome::NoResults => {
            progress.finish_with_message(format!("No results ({elapsed})"));
        }
        SearchOutcome::Finished { found } => {
            progress.finish_with_message(format!("{found} results ({elapsed})"));
        }
    }

    handle.shutdown().await?;
    task.await??;
    Ok(())
}

fn render_link(link: &FileLink) -> String {
    let kind = match link.info.kind {
        FileKind::Other => String::new(),
        kind => format!("[{}] ", kind.label()),
    };
    format!(
        "{}{}  {}  {} sources\n  {}",
        style(kind).dim(),
        style(&link.name).bold(),
        format_bytes(link.size),
        link.avail,
        style(link.ed2k_link()).cyan()
    )
}

/// Print the ed2k link for a name, size and KAD-order hash
fn print_link(name: &str, size: u64, hash: &str) -> anyhow::Result<()> {
    let id: KadId = hash.parse().context("invalid hash")?;
    println!("{}", ed2k_link(name, size, id.as_bytes()));
    Ok(())
}

/// List contacts from a nodes.dat file
fn list_nodes(path: PathBuf) -> anyhow::Result<()> {
    let contacts =
        load_nodes_dat(&path).with_context(|| format!("failed to read {}", path.display()))?;

    println!("Contacts in {}:", path.display());
    println!();
    for contact in &contacts {
        println!(
            "  {}  {:<21}  tcp {:<5}  v{}",
            contact.id.to_hex(),
            contact.udp_addr(),
            contact.tcp_port,
            contact.version
        );
    }
    println!();
    println!("Total: {}", contacts.len());
    Ok(())
}

/// Show a fresh local identity
async fn show_identity(peer: Option<Ipv4Addr>, config: &Config) -> anyhow::Result<()> {
    let local_ip = detect_local_ip().await.context("cannot determine local identity")?;
    let prefs = config.prefs(local_ip);

    println!("kadseek identity");
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!("KAD id: {}", prefs.kad_id.to_hex());
    println!("Local IP: {}", prefs.local_ip);
    println!("Public IP: {}", prefs.public_ip());
    println!("UDP port: {}", prefs.udp_port);
    println!("TCP port: {}", prefs.tcp_port);

    if let Some(peer) = peer {
        println!("Verify key for {peer}: {:#010x}", prefs.udp_verify_key(peer));
    }

    Ok(())
}
