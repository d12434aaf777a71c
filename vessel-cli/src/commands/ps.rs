use clap::Args;
use tabled::Tabled;

use crate::cli::GlobalFlags;

#[derive(Args, Debug)]
pub struct PsArgs {}

#[derive(Tabled)]
struct Row {
    pid: u32,
    kind: String,
    command: String,
    status: String,
    exit_code: String,
}

pub async fn execute(_args: PsArgs, global: &GlobalFlags) -> anyhow::Result<()> {
    let container = global.boot_container().await?;

    // A freshly booted container starts with an empty process table: the
    // registry is in-memory only and does not survive across CLI
    // invocations, unlike the persisted VFS. `ps` is only informative
    // within the lifetime of a single `spawn`/`watch` session.
    let rows: Vec<Row> = container
        .processes()
        .into_iter()
        .map(|p| Row {
            pid: p.pid.0,
            kind: format!("{:?}", p.kind),
            command: p.command,
            status: format!("{:?}", p.status),
            exit_code: p.exit_code.map(|c| c.to_string()).unwrap_or_default(),
        })
        .collect();

    if rows.is_empty() {
        println!("no processes tracked");
    } else {
        println!("{}", tabled::Table::new(rows));
    }

    container.teardown().await;
    Ok(())
}
