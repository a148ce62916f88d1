use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use actionid::hash::{DEBUG_HASH_ENV, HASH_SIZE};
use actionid::{Action, ActionId, BuildConfig, Deriver, FileHasher};
use actionid_tracing::TracingBuilder;
use clap::Parser;
use data_encoding::HEXLOWER_PERMISSIVE;
use serde::Deserialize;
use tracing::Level;

/// Derives the action ID of a build graph described as JSON, and prints it
/// as hex, followed by its build ID encoding.
#[derive(Parser)]
struct Args {
    /// Path to the JSON document, stdin if omitted
    input: Option<PathBuf>,

    /// Log every record written into a salted hash
    #[clap(long, env = DEBUG_HASH_ENV)]
    debug_hash: bool,

    #[clap(long, default_value_t = Level::WARN)]
    log_level: Level,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Input {
    config: BuildConfig,
    action: Action,
    /// Content IDs of already built dependencies, hex encoded, by import path.
    #[serde(rename = "OutputIDs", default)]
    output_ids: BTreeMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
enum Error {
    #[error("unable to read input: {0}")]
    Read(#[from] std::io::Error),

    #[error("unable to parse input: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid output ID for {0}")]
    OutputId(String),

    #[error(transparent)]
    ActionId(#[from] actionid::Error),

    #[error(transparent)]
    Tracing(#[from] actionid_tracing::Error),
}

/// Returns a copy of `action` with relative package paths resolved against
/// `base`.
fn resolve_paths(action: &Action, base: &Path) -> Action {
    let package = action.package.as_ref().map(|p| {
        let mut p = p.as_ref().clone();
        p.dir = base.join(&p.dir);
        p.pgo_profile = p.pgo_profile.map(|profile| base.join(profile));
        Arc::new(p)
    });

    Action {
        package,
        deps: action
            .deps
            .iter()
            .map(|dep| Arc::new(resolve_paths(dep, base)))
            .collect(),
    }
}

/// Decodes a hex encoded content ID, as given in `OutputIDs`.
fn decode_output_id(import_path: &str, id: &str) -> Result<[u8; HASH_SIZE], Error> {
    HEXLOWER_PERMISSIVE
        .decode(id.as_bytes())
        .ok()
        .and_then(|id| ActionId::try_from(id.as_slice()).ok())
        .map(Into::into)
        .ok_or_else(|| Error::OutputId(import_path.to_string()))
}

fn run(args: &Args) -> Result<(), Error> {
    let mut tracing = TracingBuilder::default().level(args.log_level);
    if args.debug_hash {
        tracing = tracing.enable_hash_debug();
    }
    tracing.build()?;

    let mut buf = Vec::new();
    match &args.input {
        Some(path) => std::fs::File::open(path)?.read_to_end(&mut buf)?,
        None => std::io::stdin().read_to_end(&mut buf)?,
    };
    let input: Input = serde_json::from_slice(&buf)?;

    let action = resolve_paths(&input.action, &std::env::current_dir()?);

    let files = FileHasher::new();
    let mut deriver = Deriver::new(&input.config, &files).with_debug(args.debug_hash);
    for (import_path, id) in input.output_ids {
        let id = decode_output_id(&import_path, &id)?;
        deriver = deriver.with_output_id(import_path, id);
    }

    let id = deriver.derive(&action)?;
    println!("{}", id);
    println!("{}", id.to_build_id_string());

    Ok(())
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("actionid-dump: {}", e);
        std::process::exit(1);
    }
}
