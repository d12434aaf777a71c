use std::path::{Path, PathBuf};

use clap::Args;

use crate::cli::GlobalFlags;

#[derive(Args, Debug)]
pub struct MountArgs {
    /// File or directory on the host to install into the container.
    pub host_path: PathBuf,

    /// Destination path inside the container's VFS.
    #[arg(default_value = "/")]
    pub dest: String,
}

pub async fn execute(args: MountArgs, global: &GlobalFlags) -> anyhow::Result<()> {
    let container = global.boot_container().await?;
    let fs = container.fs();

    let mut installed = 0usize;
    install(&fs, &args.host_path, &args.dest, &mut installed).await?;

    println!("mounted {} entries at {}", installed, args.dest);
    container.teardown().await;
    Ok(())
}

async fn install(
    fs: &vessel::FsHandle,
    host_path: &Path,
    dest: &str,
    installed: &mut usize,
) -> anyhow::Result<()> {
    let metadata = std::fs::metadata(host_path)?;
    if metadata.is_dir() {
        fs.mkdir(dest, false).await.or_else(ignore_eexist)?;
        *installed += 1;
        let mut entries: Vec<_> = std::fs::read_dir(host_path)?.collect::<Result<_, _>>()?;
        entries.sort_by_key(|e| e.file_name());
        for entry in entries {
            let name = entry.file_name().to_string_lossy().into_owned();
            let child_dest = if dest.ends_with('/') { format!("{dest}{name}") } else { format!("{dest}/{name}") };
            Box::pin(install(fs, &entry.path(), &child_dest, installed)).await?;
        }
    } else {
        let contents = std::fs::read(host_path)?;
        fs.write_file(dest, contents).await?;
        *installed += 1;
    }
    Ok(())
}

fn ignore_eexist(err: vessel::VesselError) -> anyhow::Result<()> {
    match err {
        vessel::VesselError::Fs { code: vessel_shared::errors::FsErrorCode::EEXIST, .. } => Ok(()),
        other => Err(other.into()),
    }
}
