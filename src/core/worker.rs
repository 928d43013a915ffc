// Copyright 2026 AppShelf Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{
    path::PathBuf,
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::{Context, Result, anyhow};

use crate::{
    conf::config::Layout,
    core::{
        InstallOutcome, InstallRequest,
        confirm::{self, Confirm},
        extract::{self, ExtractedMetadata},
    },
};

/// Runs an install on its own thread. Overwrite questions go through
/// `confirmer`; someone has to answer them on the other end of the channel.
pub fn spawn_install(
    request: InstallRequest,
    layout: Layout,
    confirmer: confirm::ChannelConfirm,
) -> Result<JoinHandle<Result<InstallOutcome>>> {
    thread::Builder::new()
        .name("appshelf-install".to_owned())
        .spawn(move || {
            let mut confirmer = confirmer;
            crate::core::install(&request, &layout, &mut confirmer)
        })
        .context("Failed to start install worker")
}

pub fn spawn_inspect(
    artifact: PathBuf,
    timeout: Duration,
) -> Result<JoinHandle<Option<ExtractedMetadata>>> {
    thread::Builder::new()
        .name("appshelf-inspect".to_owned())
        .spawn(move || extract::inspect(&artifact, timeout))
        .context("Failed to start inspect worker")
}

/// Starts the install worker, answers its questions with `confirm` on the
/// calling thread and waits for the result.
pub fn install_blocking(
    request: InstallRequest,
    layout: Layout,
    confirm: &mut dyn Confirm,
) -> Result<InstallOutcome> {
    let (confirmer, requests) = confirm::channel();
    let handle = spawn_install(request, layout, confirmer)?;
    confirm::serve(requests, confirm);
    join(handle)?
}

pub fn join<T>(handle: JoinHandle<T>) -> Result<T> {
    let name = handle.thread().name().unwrap_or("worker").to_string();
    handle
        .join()
        .map_err(|_| anyhow!("{name} thread panicked"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::extract::tests::{EXTRACTING_BODY, fake_artifact};
    use tempfile::tempdir;

    #[test]
    fn inspect_runs_off_thread() {
        let dir = tempdir().unwrap();
        let artifact = fake_artifact(dir.path(), "Sample.AppImage", EXTRACTING_BODY);

        let handle = spawn_inspect(artifact, Duration::from_secs(20)).unwrap();
        assert_eq!(handle.thread().name(), Some("appshelf-inspect"));
        let metadata = join(handle).unwrap().unwrap();
        assert_eq!(metadata.suggested_name.as_deref(), Some("Sample Tool"));
    }
}
