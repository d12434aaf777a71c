use predicates::prelude::*;

mod common;

#[test]
fn export_round_trips_mounted_file() {
    let ctx = common::vessel();
    let host_dir = tempfile::tempdir().unwrap();
    std::fs::write(host_dir.path().join("hello.txt"), b"hi there").unwrap();

    ctx.new_cmd().arg("mount").arg(host_dir.path()).arg("/app").assert().success();

    ctx.new_cmd()
        .arg("export")
        .arg("/app")
        .assert()
        .success()
        .stdout(predicate::str::contains("hello.txt"));
}

#[test]
fn export_writes_to_host_directory() {
    let ctx = common::vessel();
    let host_dir = tempfile::tempdir().unwrap();
    std::fs::write(host_dir.path().join("hello.txt"), b"hi there").unwrap();
    let out_dir = tempfile::tempdir().unwrap();

    ctx.new_cmd().arg("mount").arg(host_dir.path()).arg("/app").assert().success();

    ctx.new_cmd()
        .arg("export")
        .arg("/app")
        .arg("--out")
        .arg(out_dir.path())
        .assert()
        .success();

    assert_eq!(std::fs::read(out_dir.path().join("hello.txt")).unwrap(), b"hi there");
}
