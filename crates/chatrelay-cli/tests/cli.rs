use assert_cmd::Command;
use assert_cmd::assert::OutputAssertExt;
use predicates::str::{contains, starts_with};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Command with a clean environment and an empty config file
fn chatrelay(workdir: &tempfile::TempDir) -> Command {
    let config = workdir.path().join("config.toml");
    std::fs::write(&config, "").unwrap();

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("chatrelay"));
    cmd.current_dir(workdir.path())
        .env_remove("BOT_TOKEN")
        .env_remove("TELEGRAM_BOT_TOKEN")
        .env_remove("OPENAI_API_KEY")
        .env_remove("TELEGRAM_API_BASE")
        .env_remove("RUST_LOG")
        .env_remove("CHATRELAY_CONFIG")
        .env_remove("CHATRELAY_LOG_DIR")
        .env("CHATRELAY_DISABLE_SYSTEM_PROXY", "1")
        .arg("--config")
        .arg(&config);
    cmd
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("chatrelay"));
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(contains("Telegram"))
        .stdout(contains("--history-limit"));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("chatrelay"));
    cmd.arg("--version").assert().success();
}

#[test]
fn test_cli_completions() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("chatrelay"));
    cmd.args(["completions", "bash"])
        .assert()
        .success()
        .stdout(starts_with("_chatrelay"));
}

#[test]
fn test_missing_bot_token_exits_with_error() {
    let workdir = tempfile::tempdir().unwrap();
    chatrelay(&workdir)
        .arg("check")
        .assert()
        .failure()
        .code(1)
        .stderr(contains("bot token is not set"));
}

#[test]
fn test_invalid_history_limit_is_rejected() {
    let workdir = tempfile::tempdir().unwrap();
    chatrelay(&workdir)
        .env("BOT_TOKEN", "123:ABC")
        .env("CHATRELAY_HISTORY_LIMIT", "lots")
        .arg("check")
        .assert()
        .failure()
        .stderr(contains("CHATRELAY_HISTORY_LIMIT"));
}

#[test]
fn test_broken_config_file_is_reported() {
    let workdir = tempfile::tempdir().unwrap();
    let broken = workdir.path().join("broken.toml");
    std::fs::write(&broken, "[relay\n").unwrap();

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("chatrelay"));
    cmd.current_dir(workdir.path())
        .env("BOT_TOKEN", "123:ABC")
        .arg("--config")
        .arg(&broken)
        .arg("check")
        .assert()
        .failure()
        .stderr(contains("Failed to parse config file"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_check_reports_bot_username() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bot123:ABC/getMe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": {"id": 77, "is_bot": true, "first_name": "Relay", "username": "relay_bot"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let workdir = tempfile::tempdir().unwrap();
    let mut cmd = chatrelay(&workdir);
    cmd.env("BOT_TOKEN", "123:ABC")
        .env("TELEGRAM_API_BASE", server.uri())
        .arg("check");

    let output = tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap();
    output
        .assert()
        .success()
        .stdout(contains("@relay_bot"))
        .stdout(contains("gpt-3.5-turbo"));
}

#[test]
fn test_env_file_supplies_token() {
    let workdir = tempfile::tempdir().unwrap();
    let env_file = workdir.path().join("relay.env");
    std::fs::write(
        &env_file,
        "BOT_TOKEN=from-file\nTELEGRAM_API_BASE=http://127.0.0.1:9\n",
    )
    .unwrap();

    // The token is found, so the check gets as far as calling Telegram.
    chatrelay(&workdir)
        .arg("--env-file")
        .arg(&env_file)
        .arg("check")
        .assert()
        .failure()
        .stderr(contains("Telegram getMe request failed"));
}

#[test]
fn test_missing_env_file_is_an_error() {
    let workdir = tempfile::tempdir().unwrap();
    chatrelay(&workdir)
        .args(["--env-file", "does-not-exist.env", "check"])
        .assert()
        .failure()
        .stderr(contains("Failed to load env file"));
}

#[test]
fn test_env_file_can_point_at_the_config_file() {
    let workdir = tempfile::tempdir().unwrap();
    let broken = workdir.path().join("broken.toml");
    std::fs::write(&broken, "[relay\n").unwrap();
    std::fs::write(
        workdir.path().join(".env"),
        format!("BOT_TOKEN=123:ABC\nCHATRELAY_CONFIG={}\n", broken.display()),
    )
    .unwrap();

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("chatrelay"));
    cmd.current_dir(workdir.path())
        .env_remove("BOT_TOKEN")
        .env_remove("CHATRELAY_CONFIG")
        .env_remove("CHATRELAY_LOG_DIR")
        .arg("check")
        .assert()
        .failure()
        .stderr(contains("Failed to parse config file"));
}

#[test]
fn test_config_flag_wins_over_env_file() {
    let workdir = tempfile::tempdir().unwrap();
    let env_file = workdir.path().join("relay.env");
    std::fs::write(
        &env_file,
        "CHATRELAY_CONFIG=/nonexistent/broken.toml\nTELEGRAM_API_BASE=http://127.0.0.1:9\nBOT_TOKEN=123:ABC\n",
    )
    .unwrap();

    // The empty --config file is used, so the run reaches the Telegram call.
    chatrelay(&workdir)
        .arg("--env-file")
        .arg(&env_file)
        .arg("check")
        .assert()
        .failure()
        .stderr(contains("Telegram getMe request failed"));
}
