use assert_cmd::Command;
use predicates::str::contains;

#[test]
fn s1_16pam_snr10_table_output() {
    Command::cargo_bin("gallager")
        .unwrap()
        .args([
            "compute",
            "--m",
            "16",
            "--modulation",
            "pam",
            "--snr",
            "10",
            "--rate",
            "0.5",
            "--quadrature-order",
            "30",
            "--n",
            "100",
        ])
        .assert()
        .success()
        .stdout(contains("Pe"))
        .stdout(contains("rho*"));
}

#[test]
fn json_output_is_valid_json() {
    let output = Command::cargo_bin("gallager")
        .unwrap()
        .args([
            "compute",
            "--m",
            "16",
            "--modulation",
            "pam",
            "--snr",
            "10",
            "--rate",
            "0.5",
            "--format",
            "json",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(parsed.get("rho_optimal").is_some());
}

#[test]
fn rejects_rate_at_or_above_capacity() {
    Command::cargo_bin("gallager")
        .unwrap()
        .args([
            "compute", "--m", "16", "--modulation", "pam", "--snr", "10", "--rate", "4.5",
        ])
        .assert()
        .failure();
}

#[test]
fn quadrature_subcommand_prints_nodes() {
    Command::cargo_bin("gallager")
        .unwrap()
        .args(["quadrature", "--n", "10"])
        .assert()
        .success()
        .stdout(contains("root"));
}
