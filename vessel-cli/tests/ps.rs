use predicates::prelude::*;

mod common;

#[test]
fn ps_on_fresh_workdir_reports_no_processes() {
    let ctx = common::vessel();
    ctx.new_cmd().arg("ps").assert().success().stdout(predicate::str::contains("no processes tracked"));
}
