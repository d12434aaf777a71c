use clap::Args;

use crate::cli::GlobalFlags;

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// VFS path to watch.
    #[arg(default_value = "/")]
    pub root: String,

    /// Glob patterns to include (default: everything).
    #[arg(long)]
    pub include: Vec<String>,

    /// Glob patterns to exclude.
    #[arg(long)]
    pub exclude: Vec<String>,
}

pub async fn execute(args: WatchArgs, global: &GlobalFlags) -> anyhow::Result<()> {
    let container = global.boot_container().await?;
    let mut watcher = container.watch(args.root.clone(), &args.include, &args.exclude)?;

    println!("watching {} (ctrl-c to stop)", args.root);
    loop {
        tokio::select! {
            event = watcher.recv() => match event {
                Some(event) => println!("{:?} {}", event.kind, event.path),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    drop(watcher);
    container.teardown().await;
    Ok(())
}
