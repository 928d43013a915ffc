// Copyright 2026 AppShelf Developers
// SPDX-License-Identifier: GPL-3.0-or-later

mod cli;
mod conf;
mod core;
mod defs;
mod mount;
mod utils;

use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, bail};
use clap::Parser;
use mimalloc::MiMalloc;
use serde_json::json;

use crate::{
    cli::{Cli, Commands},
    conf::config::{Config, Layout, default_config_path},
    core::{
        IconSource, InstallOutcome, InstallRequest,
        confirm::{AssumeYes, Confirm, TerminalConfirm},
        extract::ExtractedMetadata,
        records::{RecordStore, RemovalOutcome},
        relocate::{self, BootstrapOutcome},
        worker,
    },
    mount::{inspect, table},
};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn load_config(cli: &Cli) -> Result<Config> {
    if let Some(config_path) = &cli.config {
        return Config::from_file(config_path);
    }
    match Config::load_default() {
        Ok(config) => Ok(config),
        Err(e) => {
            eprintln!("Error loading config: {:#}", e);
            Ok(Config::default())
        }
    }
}

fn confirmer(yes: bool) -> Box<dyn Confirm> {
    if yes {
        Box::new(AssumeYes)
    } else {
        Box::new(TerminalConfirm)
    }
}

fn inspect_artifact(artifact: &Path, timeout: Duration) -> Result<Option<ExtractedMetadata>> {
    let handle = worker::spawn_inspect(artifact.to_path_buf(), timeout)?;
    worker::join(handle)
}

fn resolve_name(artifact: &Path, name: Option<String>, config: &Config) -> Result<String> {
    if let Some(name) = name {
        return Ok(name);
    }
    let metadata = if config.extract_icons {
        inspect_artifact(artifact, config.extract_timeout())?
    } else {
        None
    };
    crate::core::suggest_name(artifact, metadata.as_ref())
        .context("Cannot derive a name from the artifact, pass --name")
}

fn cmd_install(request: InstallRequest, layout: &Layout, confirm: &mut dyn Confirm) -> Result<()> {
    match worker::install_blocking(request, layout.clone(), confirm)? {
        InstallOutcome::Installed(report) => {
            println!(
                "Installed {} -> {}",
                report.record.display_name,
                report.record.descriptor_path.display()
            );
            match &report.icon {
                IconSource::Manual(path) => println!("  icon: {} (provided)", path.display()),
                IconSource::Extracted(path) => println!("  icon: {} (from artifact)", path.display()),
                IconSource::Generic => println!("  icon: {}", defs::GENERIC_ICON),
            }
            for note in &report.notes {
                println!("  note: {note}");
            }
        }
        InstallOutcome::Cancelled => println!("Cancelled, nothing changed"),
    }
    Ok(())
}

fn cmd_list(layout: &Layout, as_json: bool) -> Result<()> {
    let records = RecordStore::new(layout).list_records();
    if as_json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("No applications installed");
    }
    for record in &records {
        let artifact = record
            .artifact_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{}\t{}", record.display_name, artifact);
    }
    Ok(())
}

fn cmd_uninstall(config: &Config, layout: &Layout, name: &str) -> Result<()> {
    let Some(record) = RecordStore::new(layout).find(name) else {
        bail!("No installed application named '{}'", name);
    };

    let report = crate::core::uninstall(layout, &record, config.refresh_launcher_cache);
    for file in &report.files {
        match &file.outcome {
            RemovalOutcome::Removed => println!("removed {}: {}", file.kind, file.path.display()),
            RemovalOutcome::Missing => println!("missing {}: {}", file.kind, file.path.display()),
            RemovalOutcome::Failed(reason) => {
                println!("FAILED  {}: {} ({})", file.kind, file.path.display(), reason)
            }
        }
    }
    if !report.is_clean() {
        bail!("{} was only partially removed", record.display_name);
    }
    Ok(())
}

fn cmd_inspect(config: &Config, artifact: PathBuf) -> Result<()> {
    let Some(metadata) = inspect_artifact(&artifact, config.extract_timeout())? else {
        bail!("{} could not be extracted", artifact.display());
    };
    let report = json!({
        "artifact": artifact,
        "on_non_executable_mount": inspect::is_non_executable(&artifact),
        "metadata": metadata,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn cmd_mounts(paths: Vec<PathBuf>) -> Result<()> {
    if paths.is_empty() {
        println!("{}", serde_json::to_string_pretty(&table::list_mounts())?);
        return Ok(());
    }
    let verdicts: Vec<_> = paths
        .iter()
        .map(|path| {
            let mount = inspect::find_mount_for(path);
            let non_executable = mount.as_ref().is_some_and(inspect::blocks_execution);
            json!({
                "path": path,
                "mount": mount,
                "non_executable": non_executable,
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&verdicts)?);
    Ok(())
}

fn cmd_self_launcher(config: &Config, layout: &Layout) -> Result<()> {
    let target = match relocate::running_artifact() {
        Some(running) => relocate::relocate(&running, layout)?,
        None => env::current_exe().context("Cannot locate the running executable")?,
    };
    let path = relocate::install_self_launcher(layout, &target, config.refresh_launcher_cache)?;
    println!("Launcher written: {}", path.display());
    Ok(())
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::GenConfig { output } => {
            let path = output.clone().unwrap_or_else(default_config_path);
            Config::default().save_to_file(&path)?;
            println!("Config written: {}", path.display());
            return Ok(());
        }
        Commands::ShowConfig => {
            let config = load_config(&cli)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            return Ok(());
        }
        _ => {}
    }

    let mut config = load_config(&cli)?;
    let no_extract = matches!(cli.command, Commands::Install { no_extract: true, .. });
    config.merge_with_cli(cli.install_dir.clone(), cli.verbose, no_extract);

    let _log_guard = utils::init_logging(config.verbose, config.log_file.as_deref())?;
    log::debug!("{} starting", defs::APP_NAME);

    let layout = config.layout();
    let mut confirm = confirmer(cli.yes);

    if !cli.no_bootstrap {
        let running = relocate::running_artifact();
        match relocate::bootstrap_check_and_offer(running.as_deref(), &layout, confirm.as_mut()) {
            BootstrapOutcome::Relaunched(dest) => {
                log::info!("Continuing from {}", dest.display());
                return Ok(());
            }
            BootstrapOutcome::Failed(reason) => {
                log::warn!("Staying at the current location: {}", reason)
            }
            BootstrapOutcome::Declined | BootstrapOutcome::NotApplicable => {}
        }
    }

    match cli.command {
        Commands::Install {
            artifact,
            name,
            comment,
            categories,
            icon,
            ..
        } => {
            let name = resolve_name(&artifact, name, &config)?;
            let mut request = InstallRequest::new(artifact, name, &config);
            request.comment = comment;
            request.categories = categories;
            request.manual_icon = icon;
            cmd_install(request, &layout, confirm.as_mut())
        }
        Commands::List { json } => cmd_list(&layout, json),
        Commands::Uninstall { name } => cmd_uninstall(&config, &layout, &name),
        Commands::Inspect { artifact } => cmd_inspect(&config, artifact),
        Commands::Mounts { paths } => cmd_mounts(paths),
        Commands::SelfLauncher => cmd_self_launcher(&config, &layout),
        Commands::GenConfig { .. } | Commands::ShowConfig => Ok(()),
    }
}

fn main() {
    if let Err(e) = run() {
        log::error!("Fatal Error: {:#}", e);
        eprintln!("Fatal Error: {:#}", e);
        std::process::exit(1);
    }
}
