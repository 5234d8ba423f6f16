//! TUI smoke tests. Every case runs `tui --once` with `CHATFX_TUI_HEADLESS=1`,
//! which resolves the unfiltered view through the worker and exits.

use assert_cmd::Command;
use std::fs;

mod util;
use util::{ExportFixture, TempFixtureDir, scenario_export};

fn tui_cmd(tmp: &TempFixtureDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("chatfx"));
    cmd.arg("--config")
        .arg(tmp.path().join("missing-config.toml"))
        .arg("--data-dir")
        .arg(tmp.path().join("data"))
        .env("CHATFX_TUI_HEADLESS", "1");
    cmd
}

fn log_contents(tmp: &TempFixtureDir) -> String {
    let logs = tmp.path().join("data/logs");
    let mut out = String::new();
    for entry in fs::read_dir(&logs).expect("log dir exists") {
        let path = entry.unwrap().path();
        out.push_str(&fs::read_to_string(path).unwrap_or_default());
    }
    out
}

#[test]
fn headless_once_exits_cleanly() {
    let tmp = TempFixtureDir::new();
    let messages = tmp.export(&scenario_export());
    tui_cmd(&tmp)
        .args(["tui", "--once", "-m"])
        .arg(&messages)
        .assert()
        .success();

    let logs = log_contents(&tmp);
    assert!(logs.contains("review_opened"), "logs:\n{logs}");
    assert!(logs.contains("tui_headless_done"), "logs:\n{logs}");
    assert!(logs.contains("messages=4"), "logs:\n{logs}");
}

#[test]
fn headless_once_handles_an_empty_export() {
    let tmp = TempFixtureDir::new();
    let messages = tmp.export(&ExportFixture::new());
    tui_cmd(&tmp)
        .args(["tui", "--once", "-m"])
        .arg(&messages)
        .assert()
        .success();
    assert!(log_contents(&tmp).contains("tui_headless_done"));
}

#[test]
fn headless_once_fails_on_a_missing_export() {
    let tmp = TempFixtureDir::new();
    tui_cmd(&tmp)
        .args(["tui", "--once", "-m"])
        .arg(tmp.path().join("nope.jsonl"))
        .assert()
        .failure();
}
