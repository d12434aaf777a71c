use predicates::prelude::*;

mod common;

#[test]
fn mount_installs_host_directory() {
    let ctx = common::vessel();
    let host_dir = tempfile::tempdir().unwrap();
    std::fs::write(host_dir.path().join("hello.txt"), b"hi there").unwrap();

    let mut cmd = ctx.new_cmd();
    cmd.arg("mount")
        .arg(host_dir.path())
        .arg("/app")
        .assert()
        .success()
        .stdout(predicate::str::contains("mounted"));
}

#[test]
fn mount_missing_host_path_fails() {
    let ctx = common::vessel();
    let mut cmd = ctx.new_cmd();
    cmd.arg("mount").arg("/no/such/path/anywhere").assert().failure();
}
