//! Subcommand implementations.

use crate::shell::{self, ShellCommand, HELP};
use anyhow::{Context, Result};
use peerdex_directory::{ConfigOverrides, DirectoryConfig};
use peerdex_peer::{FetchOutcome, LocalStore, PeerConfig, PeerNode};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

pub struct DirectoryArgs {
    pub config: Option<PathBuf>,
    pub listen: Option<SocketAddr>,
    pub peer_timeout: Option<u64>,
    pub sweep_interval: Option<u64>,
}

pub struct PeerArgs {
    pub config: Option<PathBuf>,
    pub name: Option<String>,
    pub port: Option<u16>,
    pub directory: Option<String>,
    pub repo: Option<PathBuf>,
}

pub async fn directory(args: DirectoryArgs) -> Result<()> {
    let overrides = ConfigOverrides {
        listen_addr: args.listen,
        peer_timeout: args.peer_timeout.map(Duration::from_secs),
        sweep_interval: args.sweep_interval.map(Duration::from_secs),
    };
    let config = DirectoryConfig::resolve(args.config.as_deref(), &overrides)
        .context("loading configuration")?;

    println!("Directory listening on {}", config.listen_addr);
    peerdex_directory::serve(config).await?;
    Ok(())
}

pub async fn peer(args: PeerArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => {
            PeerConfig::load(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => PeerConfig::default(),
    };
    if let Some(name) = args.name {
        config.name = name;
    }
    if let Some(port) = args.port {
        config.listen_addr.set_port(port);
    }
    if let Some(directory) = args.directory {
        config.directory = directory;
    }
    if args.repo.is_some() {
        config.repository = args.repo;
    }

    tracing::debug!(config = ?config, "Peer configuration");
    let node = PeerNode::start(&config)
        .await
        .with_context(|| format!("joining the network via {}", config.directory))?;
    println!(
        "Joined as {} (repository {})",
        node.client().identity(),
        node.store().root().display()
    );
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match shell::parse(&line) {
                    Ok(Some(ShellCommand::Quit)) => break,
                    Ok(Some(command)) => {
                        if let Err(e) = run(&node, command).await {
                            println!("error: {e:#}");
                        }
                    }
                    Ok(None) => {}
                    Err(e) => println!("{e}"),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    node.shutdown().await;
    Ok(())
}

async fn run(node: &PeerNode, command: ShellCommand) -> Result<()> {
    let client = node.client();
    match command {
        ShellCommand::Publish { local, name } => {
            client.publish(&local, name.as_deref()).await?;
            println!("published {}", name.as_deref().unwrap_or(&local));
        }
        ShellCommand::Fetch { name } => match client.fetch(&name).await? {
            FetchOutcome::AlreadyLocal => println!("{name} is already in the repository"),
            FetchOutcome::Downloaded { provider, bytes } => {
                println!("fetched {name} ({bytes} bytes) from {provider}");
            }
        },
        ShellCommand::Discover { peer: None } => {
            let listing = client.discover().await?;
            if listing.is_empty() {
                println!("no files on the network");
            }
            for (file, providers) in listing {
                let providers: Vec<String> = providers.iter().map(ToString::to_string).collect();
                println!("{file}: {}", providers.join(", "));
            }
        }
        ShellCommand::Discover { peer: Some(peer) } => {
            for file in client.discover_peer(&peer).await? {
                println!("{file}");
            }
        }
        ShellCommand::List => {
            let store = node.store();
            for file in store.list_files()? {
                println!("{file}\t{} bytes", store.file_size(&file)?);
            }
        }
        ShellCommand::Ping => {
            client.ping().await?;
            println!("alive");
        }
        ShellCommand::Add { path, name } => {
            let name = match name {
                Some(name) => name,
                None => path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(ToString::to_string)
                    .context("cannot derive a name from the path")?,
            };
            let bytes = node.store().import(&path, &name)?;
            client.update_file_list().await?;
            println!("added {name} ({bytes} bytes)");
        }
        ShellCommand::Help => println!("{HELP}"),
        ShellCommand::Quit => {}
    }
    Ok(())
}
