use anyhow::{anyhow, Result};
use serde_json::{json, Value};
use std::env;
use std::path::Path;
use std::process::ExitCode;

use revtree::commands::{ensure_initialized, Commands};
use revtree::config::CoreConfig;
use revtree::utils::logging::init_tracing;

const USAGE: &str = "\
Available commands:
  init <dir>                         - Create an archive directory
  commit <dir> <content> [parent...] - Record a revision (parents default to the tips)
  parents <dir> <tag>                - Parents of a revision
  common <dir> <tag>...              - Latest common ancestor
  descends <dir> <tag> <ancestor>    - Does <tag> descend from <ancestor>?
  superseded <dir> <new> [existing]  - Is <existing> (or <new>, against the tips) superseded?
  minimal <dir> <tag>...             - Drop tags that are ancestors of other tags
  bases <dir> <tag>...               - Canonical (non-merge) bases
  tips <dir>                         - Current branch tips
  find <dir> <prefix>                - Revision reachable from the tips with a hex prefix
  help                               - Show this help message
Tags may be full hex, a unique hex prefix, or `blank`.";

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        eprintln!("Missing command.\n{USAGE}");
        return ExitCode::FAILURE;
    };
    if command == "help" {
        println!("{USAGE}");
        return ExitCode::SUCCESS;
    }
    let Some(dir) = args.get(1).map(Path::new) else {
        eprintln!("Missing archive directory.\n{USAGE}");
        return ExitCode::FAILURE;
    };

    let filter = CoreConfig::load(dir)
        .map(|cfg| cfg.logging.filter)
        .unwrap_or_else(|_| "info".to_string());
    init_tracing(&filter);

    match run(command, dir, &args[2..]).await {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output).unwrap_or_else(|_| output.to_string()));
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: &str, dir: &Path, rest: &[String]) -> Result<Value> {
    if command == "init" {
        let report = ensure_initialized(dir)?;
        return Ok(json!({
            "root": report.root,
            "created": report.created,
            "existed": report.existed,
        }));
    }

    let commands = Commands::open(dir)?;
    let arg = |i: usize, what: &str| {
        rest.get(i)
            .map(String::as_str)
            .ok_or_else(|| anyhow!("missing {what}"))
    };

    let output = match command {
        "commit" => {
            let content = arg(0, "content")?;
            json!(commands.commit(content.as_bytes(), &rest[1..]).await?)
        }
        "parents" => json!(commands.parents(arg(0, "tag")?).await?),
        "common" => json!(commands.common(rest).await?),
        "descends" => json!(commands.descends(arg(0, "tag")?, arg(1, "ancestor")?).await?),
        "superseded" => match rest.get(1) {
            Some(existing) => json!(commands.superseded(arg(0, "new tag")?, existing).await?),
            None => json!(commands.is_superseded(arg(0, "tag")?).await?),
        },
        "minimal" => json!(commands.minimal(rest).await?),
        "bases" => json!(commands.bases(rest).await?),
        "tips" => json!(commands.tips()),
        "find" => json!(commands.find(arg(0, "prefix")?).await?),
        unknown => return Err(anyhow!("unknown command: {unknown}\n{USAGE}")),
    };

    commands.persist()?;
    Ok(output)
}
