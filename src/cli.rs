// Copyright 2026 AppShelf Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "appshelf", version, about = "Install portable AppImage applications")]
pub struct Cli {
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,
    #[arg(short = 'd', long = "install-dir", global = true)]
    pub install_dir: Option<PathBuf>,
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,
    /// Answer yes to every question
    #[arg(short = 'y', long = "yes", global = true)]
    pub yes: bool,
    /// Do not offer to relocate a running artifact
    #[arg(long = "no-bootstrap", global = true)]
    pub no_bootstrap: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Copy an artifact into the install directory and add a launcher
    Install {
        artifact: PathBuf,
        /// Display name; read from the artifact when omitted
        #[arg(short = 'n', long = "name")]
        name: Option<String>,
        #[arg(long = "comment", default_value = "")]
        comment: String,
        #[arg(long = "categories", default_value = "")]
        categories: String,
        /// Icon file to use instead of searching the artifact
        #[arg(short = 'i', long = "icon")]
        icon: Option<PathBuf>,
        /// Skip self-extraction entirely
        #[arg(long = "no-extract")]
        no_extract: bool,
    },
    /// List installed applications
    List {
        #[arg(long = "json")]
        json: bool,
    },
    /// Remove an installed application by display name or slug
    Uninstall { name: String },
    /// Extract an artifact and print what it says about itself, in JSON
    Inspect { artifact: PathBuf },
    /// Print the mount serving each path, in JSON
    Mounts { paths: Vec<PathBuf> },
    /// Add a launcher for appshelf itself
    SelfLauncher,
    GenConfig {
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
    },
    ShowConfig,
}
