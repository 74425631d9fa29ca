use std::process::Command;

fn run(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_truequote"))
        .args(args)
        .output()
        .expect("truequote process should run")
}

#[test]
fn request_files_produce_three_tier_reports() {
    for path in [
        "requests/car_wash.toml",
        "requests/manufacturing.toml",
        "requests/hotel_ups.toml",
    ] {
        let output = run(&["--request", path]);
        assert!(
            output.status.success(),
            "quote failed for {path}: stderr={}",
            String::from_utf8_lossy(&output.stderr)
        );
        let stdout = String::from_utf8(output.stdout).expect("stdout should be valid UTF-8");
        for tier in ["[Starter]", "[Perfect Fit]", "[Beast Mode]"] {
            assert!(stdout.contains(tier), "{path}: missing {tier}");
        }
    }
}

#[test]
fn tier_json_is_a_single_tier_view() {
    let output = run(&["--demo", "hotel", "--tier", "perfect_fit", "--json"]);
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(json["tier"], "perfect_fit");
    assert_eq!(json["identity"]["template_id"], "hotel.full_service");
    assert!(json["financials"]["net_investment"].is_number());
}

#[test]
fn snapshot_is_written_and_stable() {
    let dir = std::env::temp_dir();
    let a = dir.join(format!("truequote-snap-a-{}.csv", std::process::id()));
    let b = dir.join(format!("truequote-snap-b-{}.csv", std::process::id()));

    for path in [&a, &b] {
        let output = run(&[
            "--demo",
            "car_wash",
            "--snapshot-out",
            path.to_str().expect("utf8 path"),
        ]);
        assert!(output.status.success());
    }

    let first = std::fs::read_to_string(&a).expect("snapshot a");
    let second = std::fs::read_to_string(&b).expect("snapshot b");
    assert_eq!(first, second);
    assert_eq!(first.lines().count(), 4);
    assert!(first.lines().nth(1).is_some_and(|l| l.starts_with("car_wash.express,2025.3,")));

    let _ = std::fs::remove_file(a);
    let _ = std::fs::remove_file(b);
}

#[test]
fn invalid_input_exits_nonzero_with_field_message() {
    let dir = std::env::temp_dir();
    let path = dir.join(format!("truequote-bad-{}.toml", std::process::id()));
    std::fs::write(
        &path,
        "region = \"CA\"\n[facility]\nindustry = \"hotel\"\n",
    )
    .expect("write request");

    let output = run(&["--request", path.to_str().expect("utf8 path")]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("quantities.rooms"), "stderr={stderr}");

    let _ = std::fs::remove_file(path);
}

#[test]
fn unknown_preset_is_rejected() {
    let output = run(&["--preset", "premium"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown preset"));
}
