use std::path::PathBuf;

use clap::Args;

use vessel::FsNode;

use crate::cli::GlobalFlags;

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// VFS path to export.
    #[arg(default_value = "/")]
    pub src: String,

    /// Directory on the host to write the exported tree into; prints the
    /// tree as JSON to stdout if omitted.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

pub async fn execute(args: ExportArgs, global: &GlobalFlags) -> anyhow::Result<()> {
    let container = global.boot_container().await?;
    let tree = container.export(&args.src).await?;

    match args.out {
        Some(dir) => {
            std::fs::create_dir_all(&dir)?;
            write_tree(&dir, &tree)?;
            println!("exported {} to {}", args.src, dir.display());
        }
        None => {
            println!("{}", serde_json::to_string_pretty(&tree)?);
        }
    }

    container.teardown().await;
    Ok(())
}

fn write_tree(dir: &std::path::Path, tree: &std::collections::BTreeMap<String, FsNode>) -> anyhow::Result<()> {
    for (name, node) in tree {
        let path = dir.join(name);
        match node {
            FsNode::Directory { entries } => {
                std::fs::create_dir_all(&path)?;
                write_tree(&path, entries)?;
            }
            FsNode::File { contents } => {
                std::fs::write(&path, contents)?;
            }
            FsNode::Symlink { target } => {
                std::fs::write(&path, target.as_bytes())?;
            }
        }
    }
    Ok(())
}
