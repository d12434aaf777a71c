#![allow(dead_code)]

use assert_cmd::Command;
use std::time::Duration;
use tempfile::TempDir;

pub struct TestContext {
    pub cmd: Command,
    pub workdir: TempDir,
}

impl TestContext {
    pub fn new_cmd(&self) -> Command {
        let bin_path = env!("CARGO_BIN_EXE_vessel");
        let mut cmd = Command::new(bin_path);
        cmd.timeout(Duration::from_secs(30));
        cmd.arg("--workdir").arg(self.workdir.path());
        cmd
    }
}

pub fn vessel() -> TestContext {
    let workdir = TempDir::new().expect("failed to create temp workdir");
    let bin_path = env!("CARGO_BIN_EXE_vessel");
    let mut cmd = Command::new(bin_path);
    cmd.timeout(Duration::from_secs(30));
    cmd.arg("--workdir").arg(workdir.path());

    TestContext { cmd, workdir }
}
