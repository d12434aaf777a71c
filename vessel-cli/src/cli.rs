use std::path::PathBuf;

use clap::{Parser, Subcommand};

use vessel::{Container, VesselOptions};

use crate::commands::{export, mount, ps, spawn, watch};

#[derive(Parser, Debug)]
#[command(name = "vessel", version, about = "Boot and drive a sandboxed vessel container")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalFlags,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Args, Debug, Clone)]
pub struct GlobalFlags {
    /// Directory holding the container's persisted VFS database. Reusing
    /// the same workdir across invocations reuses the same filesystem.
    #[arg(long, env = "VESSEL_WORKDIR", global = true)]
    pub workdir: Option<PathBuf>,

    /// A name for the container's workdir; ignored if `--workdir` is set.
    #[arg(long, default_value = "default", global = true)]
    pub name: String,
}

impl GlobalFlags {
    /// Boots a container rooted at `--workdir` (or `$VESSEL_WORKDIR/<name>`
    /// if only `--name` was given), mirroring the teacher's
    /// `GlobalFlags::create_runtime`.
    pub async fn boot_container(&self) -> anyhow::Result<Container> {
        let persist_path = match &self.workdir {
            Some(dir) => dir.join("vfs.db"),
            None => {
                let base = dirs::data_local_dir().unwrap_or_else(std::env::temp_dir).join("vessel");
                base.join(&self.name).join("vfs.db")
            }
        };
        if let Some(parent) = persist_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let options = VesselOptions::new(self.name.clone()).with_persist_path(persist_path);
        Ok(Container::boot(options).await?)
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Install a file tree into the container's VFS.
    Mount(mount::MountArgs),
    /// Spawn a command (script, builtin, or shell pipeline) and stream its output.
    Spawn(spawn::SpawnArgs),
    /// Dump a VFS subtree to stdout or a directory on the host.
    Export(export::ExportArgs),
    /// List the processes currently tracked by this container.
    Ps(ps::PsArgs),
    /// Watch a VFS subtree for changes and print events as they arrive.
    Watch(watch::WatchArgs),
}

impl Command {
    pub async fn execute(self, global: &GlobalFlags) -> anyhow::Result<()> {
        match self {
            Command::Mount(args) => mount::execute(args, global).await,
            Command::Spawn(args) => spawn::execute(args, global).await,
            Command::Export(args) => export::execute(args, global).await,
            Command::Ps(args) => ps::execute(args, global).await,
            Command::Watch(args) => watch::execute(args, global).await,
        }
    }
}
