use clap::Args;

use vessel::SpawnArgs as ProcessSpawnArgs;

use crate::cli::GlobalFlags;

#[derive(Args, Debug)]
pub struct SpawnArgs {
    /// Command to run (a builtin, a shell pipeline, or a `.js` script path).
    pub command: String,

    /// Arguments passed to `command`.
    pub args: Vec<String>,

    /// Working directory inside the container.
    #[arg(long)]
    pub cwd: Option<String>,
}

pub async fn execute(args: SpawnArgs, global: &GlobalFlags) -> anyhow::Result<()> {
    let container = global.boot_container().await?;

    let mut handle = container
        .spawn(&args.command, &args.args, ProcessSpawnArgs { cwd: args.cwd, env: Default::default() })
        .await?;

    {
        let (stdout_rx, stderr_rx) = handle.split_output();
        let mut stdout_done = false;
        let mut stderr_done = false;
        while !(stdout_done && stderr_done) {
            tokio::select! {
                chunk = stdout_rx.recv(), if !stdout_done => match chunk {
                    Some(bytes) => print!("{}", String::from_utf8_lossy(&bytes)),
                    None => stdout_done = true,
                },
                chunk = stderr_rx.recv(), if !stderr_done => match chunk {
                    Some(bytes) => eprint!("{}", String::from_utf8_lossy(&bytes)),
                    None => stderr_done = true,
                },
            }
        }
    }

    let exit_code = handle.exit().await;
    container.teardown().await;
    if exit_code != 0 {
        anyhow::bail!("process exited with code {exit_code}");
    }
    Ok(())
}
