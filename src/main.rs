use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use probeforge::{config, management, plugins, registry, InMemorySessionHost};
use tracing::info;

#[derive(Parser)]
#[command(name = "probeforge", about = "Dynamic capability registry and plugin lifecycle server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Port the management API listens on (auto-increments if taken).
    #[arg(long, default_value_t = 8787)]
    management_port: u16,

    /// Disable the hot-reload filesystem watcher.
    #[arg(long)]
    no_hot_reload: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Discover, load, and serve plugins (default).
    Serve,
    /// Load plugins once and print their resulting state, then exit.
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    probeforge::observability::init();
    let cli = Cli::parse();

    let plugins_config = config::PluginsConfig::default();
    let policy = config::PolicyFlags::from_env();

    let host = InMemorySessionHost::new();
    let capability_registry = Arc::new(registry::CapabilityRegistry::new(host.clone()));

    let keystore = if let Some(path) = &policy.trusted_keys_dir {
        plugins::TrustedKeyStore::load_from_dir(std::path::Path::new(path), &policy.trusted_key_ids)?
    } else {
        plugins::TrustedKeyStore::empty()
    };

    let loader = Arc::new(plugins::PluginLoader::new(
        host.clone(),
        capability_registry.clone(),
        keystore,
        policy,
    ));
    let manager = Arc::new(plugins::PluginManager::new(plugins_config, loader));

    let records = manager.load_all().await;
    for record in &records {
        info!(plugin = %record.id, state = ?record.state, "startup load complete");
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::Check => {
            println!("loaded {} plugin(s), {} tool(s) registered", records.len(), host.tool_count());
            return Ok(());
        }
        Command::Serve => {}
    }

    let state = management::ManagementState {
        registry: capability_registry,
        plugins: manager.clone(),
    };
    let addr = management::serve(state, cli.management_port).await?;
    info!(addr = %addr, "management API ready");

    if !cli.no_hot_reload {
        let roots = manager.roots();
        if let Err(err) = plugins::HotReloadManager::start(&roots, manager.clone()) {
            tracing::warn!(error = %err, "failed to start hot-reload watcher");
        }
    }

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    Ok(())
}
