/*
[INPUT]:  wallet-kit binary and a generated YAML config
[OUTPUT]: End-to-end CLI behavior across separate processes
[POS]:    Integration test layer - session persistence between runs
[UPDATE]: When subcommands or their output change
*/

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn workspace() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("wallet-kit-cli-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn write_config(dir: &Path) -> PathBuf {
    let config = format!(
        r#"
app:
  name: CLI Test
cache_path: {cache}
wauth:
  base_url: http://127.0.0.1:9
reconnect_grace_ms: 10
demo_extension:
  address: demo-address
  public_key: demo-public-key
"#,
        cache = dir.join("session.json").display()
    );
    let path = dir.join("wallet-kit.yaml");
    std::fs::write(&path, config).expect("write config");
    path
}

fn run(config: &Path, args: &[&str]) -> Output {
    let output = Command::new(env!("CARGO_BIN_EXE_wallet-kit"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env("RUST_LOG", "error")
        .output()
        .expect("Failed to start wallet-kit binary");

    assert!(
        output.status.success(),
        "Process exited with non-zero status: {}\nStdout: {}\nStderr: {}",
        output.status,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    output
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn strategies_lists_native_and_oauth_ids() {
    let dir = workspace();
    let config = write_config(&dir);

    let listed = stdout(&run(&config, &["strategies"]));
    for id in ["wander", "wauth-google", "wauth-github", "wauth-discord", "wauth-x"] {
        assert!(listed.contains(id), "missing {id} in:\n{listed}");
    }
}

#[test]
fn session_survives_between_processes() {
    let dir = workspace();
    let config = write_config(&dir);

    let connected = stdout(&run(&config, &["connect", "wander"]));
    assert!(connected.contains("demo-address"), "{connected}");
    assert!(dir.join("session.json").exists());

    let status = stdout(&run(&config, &["status"]));
    assert!(status.contains("connected"), "{status}");
    assert!(status.contains("demo-address"), "{status}");

    let signed = stdout(&run(&config, &["sign", "hello"]));
    assert!(!signed.trim().is_empty());

    run(&config, &["disconnect"]);
    let status = stdout(&run(&config, &["status"]));
    assert!(status.contains("no strategy selected"), "{status}");
}

#[test]
fn status_without_session_reports_nothing_selected() {
    let dir = workspace();
    let config = write_config(&dir);

    let status = stdout(&run(&config, &["status"]));
    assert!(status.contains("no strategy selected"), "{status}");
}
