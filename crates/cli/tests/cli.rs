// ABOUTME: Command-level tests for the scout binary using offline inputs only.
// ABOUTME: Exercises query generation from a region file and parsing of a saved profile page.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

#[test]
fn queries_prints_one_line_per_region() {
    let dir = tempfile::tempdir().unwrap();
    let regions = dir.path().join("regions.csv");
    fs::write(
        &regions,
        "시도,시군구,읍면동\n서울특별시,중구,\n서울특별시,중구,\n부산광역시,해운대구,우동\n",
    )
    .unwrap();

    let output = Command::cargo_bin("scout")
        .unwrap()
        .args(["queries", "--regions"])
        .arg(&regions)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let stdout = String::from_utf8(output).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines, vec!["서울특별시 중구 가볼만한곳", "부산광역시 해운대구 우동 가볼만한곳"]);
}

#[test]
fn queries_honours_a_custom_suffix() {
    let dir = tempfile::tempdir().unwrap();
    let regions = dir.path().join("regions.csv");
    fs::write(&regions, "시도,시군구\n제주특별자치도,서귀포시\n").unwrap();

    Command::cargo_bin("scout")
        .unwrap()
        .args(["queries", "--suffix", "맛집", "--regions"])
        .arg(&regions)
        .assert()
        .success()
        .stdout(predicate::str::contains("제주특별자치도 서귀포시 맛집"));
}

#[test]
fn missing_region_file_fails() {
    Command::cargo_bin("scout")
        .unwrap()
        .args(["queries", "--regions", "/nonexistent/regions.csv"])
        .assert()
        .failure();
}

#[test]
fn parse_prints_the_resolved_profile() {
    Command::cargo_bin("scout")
        .unwrap()
        .args(["parse", "--compact", "--name", "김철수"])
        .arg(fixture("profile_page.html"))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name_alt_script\":\"金哲洙\""))
        .stdout(predicate::str::contains("\"error\"").not())
        .stdout(predicate::str::contains("김도윤"));
}

#[test]
fn parse_reports_a_name_mismatch_as_an_error_profile() {
    Command::cargo_bin("scout")
        .unwrap()
        .args(["parse", "--compact", "--name", "홍길동"])
        .arg(fixture("profile_page.html"))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"resolved_title\":null"))
        .stdout(predicate::str::contains("홍길동(기업인)"));
}

#[test]
fn profiles_requires_a_name_source() {
    Command::cargo_bin("scout")
        .unwrap()
        .arg("profiles")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--names"));
}

#[test]
fn profiles_stops_when_the_browser_never_starts() {
    let dir = tempfile::tempdir().unwrap();
    let names = dir.path().join("names.txt");
    fs::write(&names, "사람1\n사람2\n사람3\n사람4\n사람5\n사람6\n").unwrap();
    let out = dir.path().join("profiles");

    Command::cargo_bin("scout")
        .unwrap()
        .args(["profiles", "--sleep", "0", "--jitter", "0", "--webdriver", "http://127.0.0.1:1"])
        .arg("--names")
        .arg(&names)
        .arg("--out-dir")
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("page source unavailable"));

    let cached = fs::read_dir(&out).map(|entries| entries.count()).unwrap_or(0);
    assert_eq!(cached, 0);
}
