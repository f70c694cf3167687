//! Line commands understood by the interactive peer.

use anyhow::{bail, Context, Result};
use peerdex_core::PeerId;
use std::path::PathBuf;

pub const HELP: &str = "\
commands:
  publish <local> [name]   announce a repository file, optionally renamed
  fetch <name>             download a file from the network
  discover [peer]          list all files, or one peer's files
  list                     list the local repository
  ping                     refresh liveness with the directory
  add <path> [name]        copy a file into the repository
  help                     show this text
  quit                     leave the network and exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Publish { local: String, name: Option<String> },
    Fetch { name: String },
    Discover { peer: Option<PeerId> },
    List,
    Ping,
    Add { path: PathBuf, name: Option<String> },
    Help,
    Quit,
}

/// Parses one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<ShellCommand>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match (verb.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("publish", [local]) => ShellCommand::Publish {
            local: (*local).to_string(),
            name: None,
        },
        ("publish", [local, name]) => ShellCommand::Publish {
            local: (*local).to_string(),
            name: Some((*name).to_string()),
        },
        ("fetch", [name]) => ShellCommand::Fetch {
            name: (*name).to_string(),
        },
        ("discover", []) => ShellCommand::Discover { peer: None },
        ("discover", [peer]) => ShellCommand::Discover {
            peer: Some(peer.parse::<PeerId>().context("expected host:port")?),
        },
        ("list" | "ls", []) => ShellCommand::List,
        ("ping", []) => ShellCommand::Ping,
        ("add", [path]) => ShellCommand::Add {
            path: PathBuf::from(path),
            name: None,
        },
        ("add", [path, name]) => ShellCommand::Add {
            path: PathBuf::from(path),
            name: Some((*name).to_string()),
        },
        ("help" | "?", []) => ShellCommand::Help,
        ("quit" | "exit", []) => ShellCommand::Quit,
        (
            "publish" | "fetch" | "discover" | "list" | "ls" | "ping" | "add" | "help" | "quit"
            | "exit",
            _,
        ) => bail!("wrong number of arguments for {verb}"),
        _ => bail!("unknown command: {verb} (try help)"),
    };
    Ok(Some(command))
}
