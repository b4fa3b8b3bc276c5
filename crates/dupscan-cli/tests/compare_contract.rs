use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

const ARTICLE: &str = "<html><body><h1>Houten schuur</h1>\
    <p>Een goede fundering bepaalt hoe lang een houten schuur meegaat. \
    Gebruik betonpoeren of een gestorte plaat en zorg voor voldoende afwatering rondom. \
    Behandel het hout jaarlijks met beits zodat vocht geen kans krijgt.</p>\
    <script>var tracking = 'niet meetellen';</script></body></html>";

fn run_compare(a: &str, b: &str, extra: &[&str]) -> serde_json::Value {
    let tmp = tempfile::tempdir().unwrap();
    let pa = tmp.path().join("a.html");
    let pb = tmp.path().join("b.html");
    std::fs::write(&pa, a).unwrap();
    std::fs::write(&pb, b).unwrap();

    let out = Command::new(env!("CARGO_BIN_EXE_dupscan"))
        .args(["compare", "--a", pa.to_str().unwrap(), "--b", pb.to_str().unwrap()])
        .args(extra)
        .env_remove("DUPSCAN_SHINGLE_SIZE")
        .output()
        .expect("run dupscan compare");
    assert!(out.status.success(), "dupscan compare failed: {out:?}");
    serde_json::from_slice(&out.stdout).expect("parse compare json")
}

#[test]
fn identical_documents_score_100() {
    let v = run_compare(ARTICLE, ARTICLE, &[]);
    assert_eq!(v["score"].as_u64(), Some(100));
    assert_eq!(v["jaccard"].as_f64(), Some(1.0));
    assert_eq!(v["containment"].as_f64(), Some(1.0));
}

#[test]
fn unrelated_documents_score_0() {
    let other = "<p>Vandaag regent het flink boven Utrecht, morgen verwachten meteorologen zonnige perioden.</p>";
    let v = run_compare(ARTICLE, other, &[]);
    assert_eq!(v["score"].as_u64(), Some(0));
}

#[test]
fn markup_and_scripts_do_not_count() {
    let plain = "Houten schuur. Een goede fundering bepaalt hoe lang een houten schuur meegaat. \
        Gebruik betonpoeren of een gestorte plaat en zorg voor voldoende afwatering rondom. \
        Behandel het hout jaarlijks met beits zodat vocht geen kans krijgt.";
    let v = run_compare(ARTICLE, plain, &["--shingle-size", "3"]);
    assert_eq!(v["score"].as_u64(), Some(100));
}

#[test]
fn zero_shingle_size_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let p = tmp.path().join("a.html");
    std::fs::write(&p, ARTICLE).unwrap();
    Command::new(env!("CARGO_BIN_EXE_dupscan"))
        .args([
            "compare",
            "--a",
            p.to_str().unwrap(),
            "--b",
            p.to_str().unwrap(),
            "--shingle-size",
            "0",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("shingle-size"));
}
