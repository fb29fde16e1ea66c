use assert_cmd::Command;
use predicates::str::contains;

fn bin() -> Command {
    Command::cargo_bin("aegis-cli").unwrap()
}

#[test]
fn help_works() {
    bin().arg("--help").assert().success().stdout(contains("protect"));
}

#[test]
fn version_works() {
    bin().arg("--version").assert().success();
}

#[test]
fn subcommand_help_works() {
    bin().args(["add-application", "--help"]).assert().success().stdout(contains("--package-id"));
}

#[test]
fn unknown_subcommand_is_a_usage_error() {
    bin().arg("frobnicate").assert().failure().code(2);
}

#[test]
fn missing_credentials_is_a_usage_error() {
    let tmp = tempfile::tempdir().unwrap();
    bin()
        .env("XDG_CONFIG_HOME", tmp.path())
        .arg("get-version")
        .assert()
        .failure()
        .code(2)
        .stderr(contains("missing authentication credentials"));
}

#[test]
fn invalid_subscription_type_is_rejected() {
    bin()
        .args(["list-builds", "--subscription-type", "BOGUS"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn json_log_format_is_accepted() {
    let tmp = tempfile::tempdir().unwrap();
    bin()
        .env("XDG_CONFIG_HOME", tmp.path())
        .args(["--log-format", "json", "get-version"])
        .assert()
        .failure()
        .code(2);
}
