//! 端到端测试 - 用内存内容提供者驱动完整分析流程

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use apidrift::analysis::BreakingChangeDetector;
use apidrift::breaking_changes::ChangeKind;
use apidrift::config::AppConfig;
use apidrift::errors::GitError;
use apidrift::git::RevisionContentProvider;

/// 内存内容提供者：键为 (文件, 修订)，缺失的键返回空串
struct MapProvider {
    files: Vec<String>,
    contents: HashMap<(String, String), String>,
}

impl MapProvider {
    fn new(entries: &[(&str, &str, &str)]) -> Self {
        let mut files: Vec<String> = entries.iter().map(|(f, _, _)| f.to_string()).collect();
        files.sort();
        files.dedup();
        let contents = entries
            .iter()
            .map(|(f, rev, content)| ((f.to_string(), rev.to_string()), content.to_string()))
            .collect();
        Self { files, contents }
    }
}

impl RevisionContentProvider for MapProvider {
    fn changed_files(&self) -> Result<Vec<String>, GitError> {
        Ok(self.files.clone())
    }

    fn content_at(&self, file_path: &str, revision: &str) -> Result<String, GitError> {
        Ok(self
            .contents
            .get(&(file_path.to_string(), revision.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn config_for(repo: &Path) -> AppConfig {
    AppConfig {
        repository_path: repo.to_path_buf(),
        base_ref: "base".to_string(),
        head_ref: "head".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_connect_scenario_reports_required_port_with_usage() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "net/ssh.py",
        "def connect(host, port, timeout=30):\n    pass\n",
    );
    write(
        dir.path(),
        "consumer.py",
        "from net.ssh import connect\n\n\ndef main():\n    connect('db', 5432)\n",
    );

    let provider = Arc::new(MapProvider::new(&[
        ("net/ssh.py", "base", "def connect(host, port=22):\n    pass\n"),
        (
            "net/ssh.py",
            "head",
            "def connect(host, port, timeout=30):\n    pass\n",
        ),
    ]));

    let detector = BreakingChangeDetector::with_provider(config_for(dir.path()), provider);
    let result = detector.analyze().await.unwrap();

    // port 失去默认值是唯一的破坏性变更；新增的可选参数 timeout 不计
    assert_eq!(result.breaking_changes.len(), 1);
    let change = &result.breaking_changes[0];
    assert_eq!(change.kind, ChangeKind::ParameterBecameRequired);
    assert!(change.description.contains("'port'"));
    assert_eq!(change.element_name, "connect");

    // 使用影响：consumer.py 被检出，声明文件自身不在其中
    let locations = &result.usage_locations["net/ssh.py:connect"];
    assert!(locations.iter().all(|l| l.file_path != "net/ssh.py"));
    assert!(locations.iter().any(|l| l.file_path == "consumer.py"));
    assert!(change.affected_files.contains("consumer.py"));

    assert_eq!(result.exit_code, 1);
    assert_eq!(result.total_files_analyzed, 1);
}

#[tokio::test]
async fn test_unparsable_file_does_not_abort_other_files() {
    let dir = tempfile::tempdir().unwrap();

    let provider = Arc::new(MapProvider::new(&[
        ("bad.py", "base", "def broken(:\n"),
        ("bad.py", "head", "def broken(:\n"),
        ("first.py", "base", "def f(a):\n    pass\n"),
        ("first.py", "head", ""),
        ("second.py", "base", "class C:\n    def m(self):\n        pass\n"),
        ("second.py", "head", "class C:\n    pass\n"),
    ]));

    let detector = BreakingChangeDetector::with_provider(config_for(dir.path()), provider);
    let result = detector.analyze().await.unwrap();

    assert_eq!(result.total_files_analyzed, 3);
    assert_eq!(result.breaking_changes.len(), 2);
    assert!(result
        .breaking_changes
        .iter()
        .any(|c| c.file_path == "first.py" && c.kind == ChangeKind::FunctionRemoved));
    assert!(result
        .breaking_changes
        .iter()
        .any(|c| c.file_path == "second.py" && c.kind == ChangeKind::MethodRemoved));
}

#[tokio::test]
async fn test_no_changed_files_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(MapProvider::new(&[]));

    let detector = BreakingChangeDetector::with_provider(config_for(dir.path()), provider);
    let result = detector.analyze().await.unwrap();

    assert!(result.breaking_changes.is_empty());
    assert_eq!(result.exit_code, 0);
}

#[tokio::test]
async fn test_ignore_unused_suppresses_exit_code_without_usage() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "unrelated.py", "x = 1\n");

    let provider = Arc::new(MapProvider::new(&[
        (
            "lib/private_helpers.py",
            "base",
            "def very_obscure_internal_name(a):\n    pass\n",
        ),
        ("lib/private_helpers.py", "head", ""),
    ]));

    let mut config = config_for(dir.path());
    config.ignore_unused = true;
    let detector = BreakingChangeDetector::with_provider(config, provider);
    let result = detector.analyze().await.unwrap();

    assert_eq!(result.breaking_changes.len(), 1);
    assert!(result.usage_locations.is_empty());
    assert_eq!(result.exit_code, 0);
}

#[tokio::test]
async fn test_wildcard_import_surfaces_as_risk_usage() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "consumer.py",
        "from lib.api import *\n\nrun_everything()\n",
    );

    let provider = Arc::new(MapProvider::new(&[
        ("lib/api.py", "base", "def removed_entry(a):\n    pass\n"),
        ("lib/api.py", "head", ""),
    ]));

    let detector = BreakingChangeDetector::with_provider(config_for(dir.path()), provider);
    let result = detector.analyze().await.unwrap();

    let locations = &result.usage_locations["lib/api.py:removed_entry"];
    assert!(locations
        .iter()
        .any(|l| l.usage_kind == apidrift::UsageKind::StarImport));
}
