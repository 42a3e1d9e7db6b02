use project_graph::engine::{AnalyzeRequest, GraphEngine};
use project_graph::graph::builder::FileInput;
use project_graph::graph::refresh::RefreshRequest;
use project_graph::utils::config::EngineConfig;
use std::fs;
use tempfile::tempdir;

fn config_at(dir: &std::path::Path) -> EngineConfig {
    EngineConfig { store_dir: dir.to_path_buf(), ..EngineConfig::default() }
}

fn request(project_id: Option<i64>) -> AnalyzeRequest {
    AnalyzeRequest {
        project_name: "web".into(),
        files: Some(vec![
            FileInput::new("src/a.ts", "import { b } from './b';\nexport const a = b;\n"),
            FileInput::new("src/b.ts", "export const b = 1;\n"),
        ]),
        persistent_project_id: project_id,
        ..AnalyzeRequest::default()
    }
}

#[test]
fn graphs_survive_reopening_the_store() {
    let dir = tempdir().unwrap();
    let id = {
        let engine = GraphEngine::open_dir(config_at(dir.path())).unwrap();
        engine.analyze("alice", request(Some(7))).unwrap().id().clone()
    };
    let file = dir.path().join(format!("{id}.json"));
    assert!(file.is_file());

    let engine = GraphEngine::open_dir(config_at(dir.path())).unwrap();
    let graph = engine.get("alice", &id).unwrap();
    assert_eq!(graph.stats().edge_count, 1);
    assert_eq!(engine.get_by_project("alice", "7").unwrap().id(), &id);
    let list = engine.list("alice").unwrap();
    assert_eq!(list.len(), 1);
    assert!(list[0].is_current);
}

#[test]
fn other_owners_cannot_see_or_delete() {
    let dir = tempdir().unwrap();
    let engine = GraphEngine::open_dir(config_at(dir.path())).unwrap();
    let id = engine.analyze("alice", request(None)).unwrap().id().clone();

    assert_eq!(engine.get("mallory", &id).unwrap_err().code(), "GRAPH_NOT_FOUND");
    assert!(engine.list("mallory").unwrap().is_empty());
    assert_eq!(engine.delete("mallory", &id).unwrap_err().code(), "GRAPH_NOT_FOUND");
    assert!(engine.get("alice", &id).is_ok());

    engine.delete("alice", &id).unwrap();
    assert!(!dir.path().join(format!("{id}.json")).exists());
}

#[test]
fn refresh_rewrites_the_stored_file() {
    let dir = tempdir().unwrap();
    let engine = GraphEngine::open_dir(config_at(dir.path())).unwrap();
    let id = engine.analyze("alice", request(None)).unwrap().id().clone();
    let req = RefreshRequest::with_files(vec![FileInput::new("src/c.ts", "import { a } from './a';\n")]);
    engine.refresh("alice", &id, &req).unwrap();

    let reopened = GraphEngine::open_dir(config_at(dir.path())).unwrap();
    let graph = reopened.get("alice", &id).unwrap();
    assert_eq!(graph.nodes().len(), 3);
    assert_eq!(graph.stats().edge_count, 2);
}

#[test]
fn stray_files_in_the_store_are_ignored() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("notes.txt"), "hello").unwrap();
    fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
    let engine = GraphEngine::open_dir(config_at(dir.path())).unwrap();
    engine.analyze("alice", request(None)).unwrap();
    assert_eq!(engine.list("alice").unwrap().len(), 1);
}
