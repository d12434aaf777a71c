use predicates::prelude::*;

mod common;

#[test]
fn spawn_echo_prints_to_stdout() {
    let ctx = common::vessel();
    ctx.new_cmd()
        .arg("spawn")
        .arg("echo")
        .arg("hello")
        .arg("world")
        .assert()
        .success()
        .stdout(predicate::str::contains("hello world"));
}

#[test]
fn spawn_unknown_command_fails() {
    let ctx = common::vessel();
    ctx.new_cmd().arg("spawn").arg("not-a-real-command").assert().failure();
}
