use std::path::PathBuf;
use std::process::{Command, Output};

fn data(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("data").join(name)
}

fn optiform(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_optiform"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run optiform")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_assignment_instance() {
    let file = data("assignment.json");
    let output = optiform(&["assignment", file.to_str().unwrap()]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("Status: OPTIMAL"));
    assert!(text.contains("Total cost: 13"));
    assert!(text.contains("worker 1 -> task 0"));
}

#[test]
fn test_knapsack_json_output() {
    let file = data("knapsack.json");
    let output = optiform(&["knapsack", file.to_str().unwrap(), "--format", "json"]);
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["status"], "optimal");
    assert_eq!(json["result"]["total_value"], 30.0);
    assert_eq!(json["result"]["items"].as_array().unwrap().len(), 2);
}

#[test]
fn test_infeasible_schedule_exits_nonzero_without_numbers() {
    let file = data("scheduling.json");
    let output = optiform(&["scheduling", file.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    let text = stdout(&output);
    assert_eq!(text.trim(), "Status: INFEASIBLE");
}

#[test]
fn test_routing_tour() {
    let file = data("routing.json");
    let output = optiform(&["routing", file.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("vehicle 0: 0 -> 1 -> 2 -> 0"));
}

#[test]
fn test_mip_maximize() {
    let file = data("mip.txt");
    let output = optiform(&[
        "mip",
        "--objective",
        "5 4",
        "--constraints",
        file.to_str().unwrap(),
        "--types",
        "integer integer",
        "--maximize",
    ]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("Objective value: 20"));
    assert!(text.contains("x0 = 4"));
}

#[test]
fn test_check_reports_parse_error_line() {
    let file = data("mip_bad.txt");
    let output = optiform(&["check", "--objective", "1 1", "--constraints", file.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    let err = String::from_utf8_lossy(&output.stderr);
    assert!(err.contains("constraint line 2"));
    assert!(err.contains("'bad'"));

    let file = data("mip.txt");
    let output = optiform(&["check", "--objective", "5 4", "--constraints", file.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("2 variables"));
}

#[test]
fn test_missing_file() {
    let output = optiform(&["knapsack", "does-not-exist.json"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error reading file"));
}
