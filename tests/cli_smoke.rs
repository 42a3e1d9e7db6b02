use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write(root: &Path, rel: &str, content: &str) {
    let p = root.join(rel);
    if let Some(parent) = p.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(p, content).unwrap();
}

fn sample_project(root: &Path) {
    write(root, "src/index.ts", "import { util } from './util';\nimport React from 'react';\nexport default function App() {}\n");
    write(root, "src/util.ts", "export function util() {}\n");
    write(root, "src/page.ts", "import { util } from '@/util';\n");
}

fn cmd(store: &Path) -> Command {
    let mut c = Command::cargo_bin("project-graph").unwrap();
    c.current_dir(store).arg("--store").arg(store).arg("--owner").arg("tester");
    c
}

fn analyze(store: &Path, project: &Path) -> String {
    let out = cmd(store).args(["analyze", "-q", "--path"]).arg(project).output().unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    String::from_utf8(out.stdout).unwrap().trim().to_string()
}

#[test]
fn analyze_then_query() {
    let project = tempdir().unwrap();
    let store = tempdir().unwrap();
    sample_project(project.path());
    let id = analyze(store.path(), project.path());
    assert_eq!(id.len(), 32);

    cmd(store.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains(&id).and(predicate::str::contains("yes")));

    cmd(store.path())
        .args(["context", &id, "src/util.ts"])
        .assert()
        .success()
        .stdout(predicate::str::contains("It is imported by 2 file(s)"));

    cmd(store.path())
        .args(["diagram", &id, "--max-nodes", "2"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("flowchart LR").and(predicate::str::contains("n2[").not()));

    cmd(store.path())
        .args(["diagram", &id, "--type", "dot"])
        .assert()
        .success()
        .stdout(predicate::str::contains("digraph").and(predicate::str::contains("rankdir=LR;")));

    cmd(store.path())
        .args(["diagram", &id, "--type", "dot", "--theme", "dark", "--rankdir", "TB"])
        .assert()
        .success()
        .stdout(predicate::str::contains("rankdir=TB;").and(predicate::str::contains("#124559")));

    cmd(store.path())
        .args(["hubs", &id, "--top", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("src/util.ts"));

    cmd(store.path())
        .args(["path", &id, "--from", "src/page.ts", "--to", "src/util.ts"])
        .assert()
        .success()
        .stdout(predicate::str::contains("src/page.ts"));
}

#[test]
fn json_output_is_parseable() {
    let project = tempdir().unwrap();
    let store = tempdir().unwrap();
    sample_project(project.path());
    let id = analyze(store.path(), project.path());

    let out = cmd(store.path()).args(["context", &id, "src/index.ts", "--format", "json"]).output().unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["external"], serde_json::json!(["react"]));
    assert_eq!(v["stats"]["dependencyCount"], 1);
}

#[test]
fn refresh_and_delete() {
    let project = tempdir().unwrap();
    let store = tempdir().unwrap();
    sample_project(project.path());
    let id = analyze(store.path(), project.path());

    fs::remove_file(project.path().join("src/page.ts")).unwrap();
    write(project.path(), "src/extra.ts", "import { util } from './util';\n");

    cmd(store.path())
        .args(["refresh", &id, "--file", "src/extra.ts", "--file", "src/page.ts", "--path"])
        .arg(project.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("1 added, 0 updated, 1 removed"));

    cmd(store.path())
        .args(["delete", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("Deleted graph {id}")));

    cmd(store.path())
        .args(["show", &id])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error[GRAPH_NOT_FOUND]"));
}

#[test]
fn graphs_are_owner_scoped() {
    let project = tempdir().unwrap();
    let store = tempdir().unwrap();
    sample_project(project.path());
    let id = analyze(store.path(), project.path());

    let mut other = Command::cargo_bin("project-graph").unwrap();
    other
        .current_dir(store.path())
        .arg("--store")
        .arg(store.path())
        .args(["--owner", "someone-else", "show", &id])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("GRAPH_NOT_FOUND"));
}

#[test]
fn usage_errors() {
    let store = tempdir().unwrap();
    cmd(store.path())
        .args(["analyze", "--path"])
        .arg(store.path().join("missing"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Not a directory"));

    cmd(store.path())
        .args(["project", "abc"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error[INVALID_PROJECT_ID]"));

    cmd(store.path()).args(["frobnicate"]).assert().failure();
}

#[test]
fn empty_directory_is_files_required() {
    let project = tempdir().unwrap();
    let store = tempdir().unwrap();
    cmd(store.path())
        .args(["analyze", "--path"])
        .arg(project.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error[FILES_REQUIRED]"));
}

#[test]
fn completions_are_generated() {
    Command::cargo_bin("project-graph")
        .unwrap()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("project-graph"));
}
