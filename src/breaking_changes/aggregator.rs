// 变更聚合器 - 对每个变更文件跑提取+比较，汇总成完整变更集
// 单个文件的失败只损失该文件的信号，绝不中断整个运行

use std::sync::Arc;

use futures_util::StreamExt;

use crate::git::RevisionContentProvider;
use crate::structural::{extract, StructuralModel};

use super::{diff, ChangeRecord};

/// 聚合全部变更文件的破坏性变更。
///
/// 文件列表先按字典序排序再处理，配合保序的并发合并，
/// 输出顺序与完成顺序无关。每个文件的解析在阻塞线程池上执行，
/// 并发度由 `workers` 限定。
pub async fn aggregate(
    changed_files: &[String],
    provider: Arc<dyn RevisionContentProvider>,
    base_ref: &str,
    head_ref: &str,
    workers: usize,
) -> Vec<ChangeRecord> {
    let mut files: Vec<String> = changed_files.to_vec();
    files.sort();

    let results: Vec<Vec<ChangeRecord>> = futures_util::stream::iter(files.into_iter().map(
        |file| {
            let provider = Arc::clone(&provider);
            let base = base_ref.to_string();
            let head = head_ref.to_string();
            async move {
                match tokio::task::spawn_blocking(move || {
                    analyze_file(provider.as_ref(), &file, &base, &head)
                })
                .await
                {
                    Ok(records) => records,
                    Err(e) => {
                        tracing::warn!("文件分析任务失败，跳过: {}", e);
                        Vec::new()
                    }
                }
            }
        },
    ))
    .buffered(workers.max(1))
    .collect()
    .await;

    results.into_iter().flatten().collect()
}

fn analyze_file(
    provider: &dyn RevisionContentProvider,
    file_path: &str,
    base_ref: &str,
    head_ref: &str,
) -> Vec<ChangeRecord> {
    let old_content = match provider.content_at(file_path, base_ref) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!("无法获取 {} 在 {} 的内容，跳过该文件: {}", file_path, base_ref, e);
            return Vec::new();
        }
    };
    let new_content = match provider.content_at(file_path, head_ref) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!("无法获取 {} 在 {} 的内容，跳过该文件: {}", file_path, head_ref, e);
            return Vec::new();
        }
    };

    // 两侧都为空：文件被删除后不存在，或从未存在过
    if old_content.trim().is_empty() && new_content.trim().is_empty() {
        tracing::debug!("{} 两侧内容均为空，无需分析", file_path);
        return Vec::new();
    }

    // 某一侧解析失败时降级为空模型，另一侧照常参与比较
    let old_model = model_or_empty(&old_content, file_path, base_ref);
    let new_model = model_or_empty(&new_content, file_path, head_ref);

    let records = diff(&old_model, &new_model, file_path);
    tracing::debug!("{} 检测到 {} 条变更", file_path, records.len());
    records
}

fn model_or_empty(content: &str, file_path: &str, revision: &str) -> StructuralModel {
    match extract(content, file_path) {
        Ok(model) => model,
        Err(e) => {
            tracing::warn!("{} 在 {} 的版本无法解析，按空模型处理: {}", file_path, revision, e);
            StructuralModel::empty()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaking_changes::ChangeKind;
    use crate::errors::GitError;
    use std::collections::HashMap;

    /// 内存内容提供者，键为 (文件, 修订)
    struct MapProvider {
        contents: HashMap<(String, String), String>,
    }

    impl MapProvider {
        fn new(entries: &[(&str, &str, &str)]) -> Self {
            let contents = entries
                .iter()
                .map(|(file, rev, content)| {
                    ((file.to_string(), rev.to_string()), content.to_string())
                })
                .collect();
            Self { contents }
        }
    }

    impl RevisionContentProvider for MapProvider {
        fn changed_files(&self) -> Result<Vec<String>, GitError> {
            let mut files: Vec<String> = self
                .contents
                .keys()
                .map(|(file, _)| file.clone())
                .collect();
            files.sort();
            files.dedup();
            Ok(files)
        }

        fn content_at(&self, file_path: &str, revision: &str) -> Result<String, GitError> {
            Ok(self
                .contents
                .get(&(file_path.to_string(), revision.to_string()))
                .cloned()
                .unwrap_or_default())
        }
    }

    #[tokio::test]
    async fn test_aggregate_collects_changes_across_files() {
        let provider = Arc::new(MapProvider::new(&[
            ("a.py", "base", "def f(x):\n    pass\n"),
            ("a.py", "head", ""),
            ("b.py", "base", "def g(x, y=1):\n    pass\n"),
            ("b.py", "head", "def g(x, y):\n    pass\n"),
        ]));

        let records = aggregate(
            &["b.py".to_string(), "a.py".to_string()],
            provider,
            "base",
            "head",
            4,
        )
        .await;

        // 输出按排序后的文件顺序
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].file_path, "a.py");
        assert_eq!(records[0].kind, ChangeKind::FunctionRemoved);
        assert_eq!(records[1].file_path, "b.py");
        assert_eq!(records[1].kind, ChangeKind::ParameterBecameRequired);
    }

    #[tokio::test]
    async fn test_unparsable_file_does_not_abort_the_run() {
        let provider = Arc::new(MapProvider::new(&[
            ("bad.py", "base", "def broken(:\n"),
            ("bad.py", "head", "def broken(:\n"),
            ("ok.py", "base", "def f(a):\n    pass\n"),
            ("ok.py", "head", ""),
            ("other.py", "base", "class C:\n    pass\n"),
            ("other.py", "head", ""),
        ]));

        let records = aggregate(
            &[
                "bad.py".to_string(),
                "ok.py".to_string(),
                "other.py".to_string(),
            ],
            provider,
            "base",
            "head",
            2,
        )
        .await;

        assert_eq!(records.len(), 2);
        assert!(records.iter().any(|r| r.file_path == "ok.py"));
        assert!(records.iter().any(|r| r.file_path == "other.py"));
    }

    #[tokio::test]
    async fn test_one_unparsable_side_degrades_to_empty_model() {
        let provider = Arc::new(MapProvider::new(&[
            ("m.py", "base", "def f(a):\n    pass\n"),
            ("m.py", "head", "def f(a:\n"),
        ]));

        let records = aggregate(&["m.py".to_string()], provider, "base", "head", 1).await;

        // 新侧按空模型处理，旧侧的函数全部视为被删除
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, ChangeKind::FunctionRemoved);
    }

    #[tokio::test]
    async fn test_both_sides_empty_is_skipped() {
        let provider = Arc::new(MapProvider::new(&[]));
        let records = aggregate(&["gone.py".to_string()], provider, "base", "head", 1).await;
        assert!(records.is_empty());
    }
}
