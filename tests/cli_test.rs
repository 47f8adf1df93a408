use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

const ENV_VARS: [&str; 5] = [
    "PSP_API_USERNAME",
    "PSP_API_PASSWORD",
    "PSP_MERCHANT_ACCOUNT",
    "PSP_ENVIRONMENT",
    "PSP_REFUND_REASON",
];

fn command() -> Command {
    let mut cmd = Command::new(cargo_bin!());
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_cli_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = command();
    cmd.arg("tests/fixtures/notifications.jsonl")
        .arg("--orders")
        .arg("tests/fixtures/orders.json")
        .arg("--config")
        .arg("tests/fixtures/preferences.json");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "order,payment,state,external_reference,amount,captured,refunded,currency",
        ))
        .stdout(predicate::str::contains(
            "R100,0b6c8d1e-8f0a-4c57-9d59-3f0f0a6f2e11,completed,TX1,20.00,20.00,0,EUR",
        ))
        // Materialized from the authorisation, refund replayed afterwards.
        .stdout(predicate::str::contains("completed,TX2,15.00,0,5.00,EUR"))
        .stdout(predicate::str::contains("UNKNOWN").not());

    Ok(())
}

#[test]
fn test_cli_env_override_supplies_missing_preference() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = command();
    cmd.arg("tests/fixtures/notifications.jsonl")
        .arg("--orders")
        .arg("tests/fixtures/orders.json")
        .arg("--replay")
        .env("PSP_MERCHANT_ACCOUNT", "ShopEnv")
        .env("PSP_REFUND_REASON", "7");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "order,payment,state,external_reference,amount,captured,refunded,currency",
        ))
        .stdout(predicate::str::contains(
            "R100,0b6c8d1e-8f0a-4c57-9d59-3f0f0a6f2e11,completed,TX1,20.00,20.00,0,EUR",
        ))
        .stdout(predicate::str::contains("completed,TX2,15.00,0,5.00,EUR"));

    Ok(())
}

#[test]
fn test_cli_without_orders_prints_header_only() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = command();
    cmd.arg("tests/fixtures/notifications.jsonl")
        .arg("--config")
        .arg("tests/fixtures/preferences.json");

    // A bare `&str` asserts the whole of stdout.
    cmd.assert()
        .success()
        .stdout("order,payment,state,external_reference,amount,captured,refunded,currency\n");

    Ok(())
}

#[test]
fn test_cli_requires_merchant_account() {
    let mut cmd = command();
    cmd.arg("tests/fixtures/notifications.jsonl");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("merchant account is not set"));
}

#[test]
fn test_cli_missing_input_fails() {
    let mut cmd = command();
    cmd.arg("tests/fixtures/missing.jsonl")
        .arg("--config")
        .arg("tests/fixtures/preferences.json");

    cmd.assert().failure();
}
