use project_graph::utils::config::{load_config_at, load_config_near, EngineConfig, CONFIG_FILE_NAME};
use std::fs;
use tempfile::tempdir;

#[test]
fn config_is_found_in_directory() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join(CONFIG_FILE_NAME),
        "[limits]\nmax_files = 20\nanalysis_timeout_secs = 5\n[store]\nttl_hours = 1\n",
    )
    .unwrap();
    let file = load_config_near(dir.path()).unwrap().expect("config present");
    let cfg = EngineConfig::from_file(file).unwrap();
    assert_eq!(cfg.max_files, 20);
    assert_eq!(cfg.analysis_timeout, std::time::Duration::from_secs(5));
    assert_eq!(cfg.ttl, chrono::Duration::hours(1));
}

#[test]
fn missing_config_is_not_an_error() {
    let dir = tempdir().unwrap();
    assert!(load_config_near(dir.path()).unwrap().is_none());
}

#[test]
fn invalid_toml_is_a_config_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[limits\nmax_files = ").unwrap();
    assert_eq!(load_config_at(&path).unwrap_err().code(), "CONFIG_ERROR");
    assert_eq!(load_config_at(&dir.path().join("absent.toml")).unwrap_err().code(), "CONFIG_ERROR");
}

#[test]
fn resolver_section_changes_probe_order() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("c.toml");
    fs::write(&path, "[resolver]\nextensions = [\"tsx\", \"ts\"]\nindex_files = [\"main\"]\n").unwrap();
    let cfg = EngineConfig::from_file(load_config_at(&path).unwrap()).unwrap();
    assert_eq!(cfg.resolver.extensions, vec!["tsx", "ts"]);
    assert_eq!(cfg.resolver.index_files, vec!["main"]);
}
