use anyhow::{Context, Result, bail};
use serde_json::json;
use std::path::PathBuf;
use tracing::{debug, info};
use treeops::{
    config::{ToolConfig, load_config},
    core::{
        EnumerateOptions, OperationOutcome, TransferProgress, copy_tree, delete_directory,
        delete_file, enumerate, get_properties, move_tree,
    },
    observability::{init_logging, shutdown_logging},
    path::NormalizedPath,
    platform::{FileSystem, HostPathNormalizer, LocalFileSystem, PathNormalizer, ProgressAction},
};

const DEFAULT_CONFIG_FILE: &str = "treeops.json";

fn main() -> Result<()> {
    let mut args: Vec<String> = std::env::args().skip(1).collect();

    let config_path = match args.iter().position(|a| a == "--config") {
        Some(index) => {
            if index + 1 >= args.len() {
                bail!("--config requires a file path");
            }
            let path = PathBuf::from(args.remove(index + 1));
            args.remove(index);
            path
        }
        None => PathBuf::from(DEFAULT_CONFIG_FILE),
    };

    let Some(command) = args.first().cloned() else {
        print_help();
        return Ok(());
    };

    if matches!(command.as_str(), "--help" | "-h" | "help") {
        print_help();
        return Ok(());
    }

    let config =
        load_config(Some(config_path.as_path())).context("Failed to load configuration")?;

    init_logging(
        &config.log_level,
        config.log_directory.as_deref(),
        config.log_rotation.into(),
    )?;

    debug!("treeops v{} running '{}'", env!("CARGO_PKG_VERSION"), command);

    let result = run(&command, &args[1..], &config);
    shutdown_logging();
    result
}

fn run(command: &str, args: &[String], config: &ToolConfig) -> Result<()> {
    let (positional, flags): (Vec<&String>, Vec<&String>) =
        args.iter().partition(|a| !a.starts_with("--"));
    let has_flag = |name: &str| flags.iter().any(|f| f.as_str() == name);

    let normalizer = HostPathNormalizer::new();
    let fs = LocalFileSystem::new();
    let resolve = |index: usize, what: &str| -> Result<NormalizedPath> {
        let raw = positional
            .get(index)
            .with_context(|| format!("'{command}' requires a {what} argument"))?;
        normalizer
            .normalize(raw, false)
            .with_context(|| format!("Invalid {what} '{raw}'"))
    };

    match command {
        "normalize" => {
            let raw = positional
                .first()
                .context("'normalize' requires a path argument")?;
            let path = treeops::normalize(raw, has_flag("--wildcards"))
                .with_context(|| format!("Invalid path '{raw}'"))?;
            let output = json!({
                "canonical": path,
                "root_kind": path.root_kind(),
                "root": path.root(),
                "components": path.components().collect::<Vec<_>>(),
                "file_name": path.file_name(),
                "extension": path.extension(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        "list" => {
            let root = resolve(0, "directory")?;
            let mut options = EnumerateOptions::new(root)
                .recursive(has_flag("--recursive"))
                .continue_on_access_error(config.defaults.continue_on_access_error);
            if let Some(pattern) = positional.get(1) {
                options = options.pattern(pattern.as_str());
            }

            let mut walker = enumerate(&fs, options)?;
            let entries = walker.by_ref().collect::<treeops::Result<Vec<_>>>()?;
            for skipped in walker.skipped() {
                eprintln!("skipped {}: {}", skipped.path, skipped.error);
            }
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        "props" => {
            let root = resolve(0, "directory")?;
            let mut options = config.defaults.properties_options();
            options.recursive |= has_flag("--recursive");

            let properties = get_properties(&fs, &root, &options)?;
            info!("{}", properties);
            println!("{}", serde_json::to_string_pretty(&properties.to_dict())?);
        }
        "delete" => {
            let target = resolve(0, "path")?;
            let info = fs
                .stat(&target, None)?
                .with_context(|| format!("Nothing to delete at {target}"))?;

            if info.is_directory() {
                let options = config.defaults.delete_options(has_flag("--recursive"));
                report(delete_directory(&fs, &target, &options)?)?;
            } else {
                delete_file(&fs, &target, config.defaults.ignore_read_only, None)?;
                println!("deleted {target}");
            }
        }
        "copy" | "move" => {
            let source = resolve(0, "source")?;
            let destination = resolve(1, "destination")?;
            let options = config.defaults.transfer_options();
            let progress = |p: &TransferProgress| {
                if let Some(file) = &p.current_file
                    && p.current_file_bytes == p.current_file_total
                {
                    debug!("{} done ({} bytes so far)", file, p.bytes_transferred);
                }
                ProgressAction::Continue
            };

            let outcome = if command == "copy" {
                copy_tree(&fs, &source, &destination, &options, progress)?
            } else {
                move_tree(&fs, &source, &destination, &options, progress)?
            };
            report(outcome)?;
        }
        other => bail!("Unknown command '{other}'. Run 'treeops --help' for usage."),
    }

    Ok(())
}

fn report(outcome: OperationOutcome) -> Result<()> {
    println!("{}", outcome.summary());
    match outcome {
        OperationOutcome::PartialFailure { first_error, .. } => Err(first_error.into()),
        _ => Ok(()),
    }
}

fn print_help() {
    println!("treeops v{} - directory tree operations", env!("CARGO_PKG_VERSION"));
    println!();
    println!("USAGE:");
    println!("  treeops [--config FILE] <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("  normalize <path> [--wildcards]        Print the canonical form of a path");
    println!("  list <dir> [pattern] [--recursive]    List directory entries as JSON");
    println!("  props <dir> [--recursive]             Aggregate sizes and attribute counts");
    println!("  delete <path> [--recursive]           Delete a file or directory tree");
    println!("  copy <src> <dst>                      Copy a file or directory tree");
    println!("  move <src> <dst>                      Move a file or directory tree");
    println!("  --help                                Show this help");
    println!();
    println!("CONFIGURATION:");
    println!("  Defaults are read from {DEFAULT_CONFIG_FILE} when present. Example:");
    println!("{}", get_example_config());
}

fn get_example_config() -> &'static str {
    r#"{
  "log_level": "info",
  "log_directory": "./logs",
  "log_rotation": { "type": "daily" },
  "defaults": {
    "continue_on_access_error": true,
    "preserve_metadata": true,
    "overwrite": false,
    "ignore_read_only": true,
    "cross_volume": "copy_fallback",
    "recursive_properties": true
  }
}"#
}
