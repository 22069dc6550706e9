mod common;

use assert_cmd::Command;
use common::{TestDatabase, match_lines};
use predicates::prelude::*;

fn index(db: &TestDatabase) -> Command {
    let mut cmd = Command::new(TestDatabase::index_bin());
    cmd.env_remove("RUST_LOG").arg(db.path());
    cmd
}

fn search_stdout(db: &TestDatabase, args: &[&str]) -> String {
    let output = Command::new(TestDatabase::search_bin())
        .arg(db.path())
        .args(args)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    String::from_utf8(output).unwrap()
}

#[test]
fn index_without_arguments_prints_usage() {
    Command::new(TestDatabase::index_bin())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Usage: simpleindex PATH_TO_DATABASE"));
}

#[test]
fn index_paragraphs_then_search() {
    let db = TestDatabase::new();
    index(&db)
        .write_stdin("Rust is a systems language\nwith a borrow checker\n\nPython is a scripting language\n\n\n")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Indexed 2 documents; database now contains 2 documents.",
        ));
    assert!(db.path().join("index.json").exists());

    let stdout = search_stdout(&db, &["borrow"]);
    assert!(stdout.contains("1 results found."));
    assert!(stdout.contains("docid=1 [Rust is a systems language\nwith a borrow checker]"));

    let stdout = search_stdout(&db, &["languages"]);
    assert_eq!(match_lines(&stdout).len(), 2);
}

#[test]
fn index_appends_to_existing_database() {
    let db = TestDatabase::new();
    index(&db).write_stdin("first document\n").assert().success();
    index(&db)
        .write_stdin("second document\n")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Indexed 1 documents; database now contains 2 documents.",
        ));

    let stdout = search_stdout(&db, &["document"]);
    assert!(stdout.contains("2 results found."));
}

#[test]
fn index_jsonl_with_values() {
    let db = TestDatabase::new();
    let input = concat!(
        r#"{"text": "apples and pears", "data": "fruit-1", "values": {"1": "fruit"}}"#,
        "\n",
        r#"{"text": "carrots and apples", "data": "mixed-2", "values": {"1": "veg"}}"#,
        "\n"
    );
    index(&db).arg("--jsonl").write_stdin(input).assert().success();

    let stdout = search_stdout(&db, &["--facet", "1", "apple"]);
    assert!(stdout.contains("2 results found."));
    assert!(stdout.contains("[fruit-1]"));
    assert!(stdout.contains("[mixed-2]"));
    assert!(stdout.contains("  fruit: 1"));
    assert!(stdout.contains("  veg: 1"));
}

#[test]
fn index_rejects_invalid_jsonl() {
    let db = TestDatabase::new();
    index(&db)
        .arg("--jsonl")
        .write_stdin("{\"text\": \"ok\"}\nnot json\n")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Exception: Invalid JSON on line 2"));
}

#[test]
fn index_rejects_unknown_stemmer() {
    let db = TestDatabase::new();
    index(&db)
        .args(["--stem", "klingon"])
        .write_stdin("text\n")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Exception: InvalidArgumentError"));
}
