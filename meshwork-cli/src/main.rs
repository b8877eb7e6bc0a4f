mod simulation;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::{Input, Select};
use meshwork::client::MeshConfig;
use simulation::SimulatedMesh;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "meshwork")]
#[command(about = "Full-mesh peer connections signaled through a shared document store")]
struct Cli {
    /// Debug logging, regardless of RUST_LOG.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON file with mesh settings.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Drop every ICE server and rely on host candidates, loopback included.
    #[arg(long, global = true)]
    no_stun: bool,

    /// Use the in-process loopback transport instead of WebRTC.
    #[arg(long, global = true)]
    loopback: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a room, wait for the full mesh and broadcast from every member.
    Simulate {
        #[arg(short = 'n', long, default_value_t = 3)]
        members: usize,

        #[arg(short, long, default_value = "hello")]
        message: String,

        #[arg(long, default_value_t = 15000)]
        timeout_ms: u64,
    },

    /// Pick a member and broadcast typed messages from it.
    Chat {
        #[arg(short = 'n', long, default_value_t = 3)]
        members: usize,

        #[arg(long, default_value_t = 15000)]
        timeout_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref(), cli.no_stun)?;

    match cli.command {
        Commands::Simulate {
            members,
            message,
            timeout_ms,
        } => simulate(members, &message, cli.loopback, config, timeout_ms).await,
        Commands::Chat {
            members,
            timeout_ms,
        } => chat(members, cli.loopback, config, timeout_ms).await,
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn load_config(path: Option<&Path>, no_stun: bool) -> Result<MeshConfig> {
    let mut config = match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => MeshConfig::default(),
    };

    if no_stun {
        config.ice_servers.clear();
        config.include_loopback_candidates = true;
    }
    Ok(config)
}

async fn simulate(
    size: usize,
    message: &str,
    loopback: bool,
    config: MeshConfig,
    timeout_ms: u64,
) -> Result<()> {
    anyhow::ensure!(size >= 2, "A mesh needs at least two members");

    println!(
        "{}",
        format!("🚀 Building a mesh of {} members...", size).green().bold()
    );
    let mut mesh = SimulatedMesh::build(size, loopback, config).await?;
    println!("   📂 Room: {}", mesh.room_id());

    mesh.wait_until_ready(Duration::from_millis(timeout_ms))
        .await?;
    println!("{}", "🔗 Full mesh established".cyan());

    for index in 0..mesh.size() {
        let text = format!("{} from {}", message, mesh.label(index));
        let sent = mesh.broadcast(index, &text).await?;
        println!("   📤 {} -> {} peers", mesh.label(index), sent);
    }

    let expected = size * (size - 1);
    let deliveries = mesh
        .collect_messages(expected, Duration::from_millis(timeout_ms))
        .await;

    for delivery in &deliveries {
        println!(
            "   📥 {} <- {}: {}",
            delivery.to.bold(),
            delivery.from,
            delivery.text
        );
    }

    if deliveries.len() == expected {
        println!(
            "{}",
            format!("✨ All {} messages delivered", expected).green().bold()
        );
        Ok(())
    } else {
        anyhow::bail!(
            "Only {} of {} messages were delivered",
            deliveries.len(),
            expected
        )
    }
}

async fn chat(size: usize, loopback: bool, config: MeshConfig, timeout_ms: u64) -> Result<()> {
    anyhow::ensure!(size >= 2, "A mesh needs at least two members");

    let mut mesh = SimulatedMesh::build(size, loopback, config).await?;
    mesh.wait_until_ready(Duration::from_millis(timeout_ms))
        .await?;
    println!(
        "{}",
        format!("💬 {} members connected in room {}", size, mesh.room_id())
            .green()
            .bold()
    );

    let mut choices: Vec<String> = (0..mesh.size()).map(|i| mesh.label(i).to_owned()).collect();
    choices.push("Quit".to_owned());

    loop {
        let items = choices.clone();
        let selected = tokio::task::spawn_blocking(move || {
            Select::new()
                .with_prompt("Send as")
                .items(&items)
                .default(0)
                .interact()
        })
        .await??;

        if selected == mesh.size() {
            break;
        }

        let text: String =
            tokio::task::spawn_blocking(|| Input::<String>::new().with_prompt("Message").interact_text())
                .await??;

        let sent = mesh.broadcast(selected, &text).await?;
        println!("   📤 sent to {} peers", sent);

        let deliveries = mesh
            .collect_messages(sent, Duration::from_millis(timeout_ms))
            .await;
        for delivery in deliveries {
            println!(
                "   📥 {} <- {}: {}",
                delivery.to.bold(),
                delivery.from,
                delivery.text
            );
        }
    }

    println!("{}", "👋 Bye".cyan());
    Ok(())
}
