// 顶层编排 - 变更文件 → 聚合比较 → 使用影响 → 退出码
// 核心各阶段都对单文件失败免疫，这里只有提供者级的错误才会上抛

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::breaking_changes::{aggregate, AnalysisResult, ChangeRecord, Severity};
use crate::config::AppConfig;
use crate::errors::AppError;
use crate::git::{GitContentProvider, RevisionContentProvider};
use crate::usage_impact::{
    collect_candidate_files, compute_impact, FsReader, UsageLocation, UsageScanner,
};

pub struct BreakingChangeDetector {
    config: AppConfig,
    provider: Arc<dyn RevisionContentProvider>,
    workers: usize,
}

impl BreakingChangeDetector {
    pub fn new(config: AppConfig) -> Self {
        let provider = Arc::new(GitContentProvider::new(
            config.repository_path.clone(),
            config.base_ref.clone(),
            config.head_ref.clone(),
            config.include_patterns.clone(),
            config.exclude_patterns.clone(),
        ));
        Self::with_provider(config, provider)
    }

    /// 注入自定义内容提供者，测试时使用内存实现
    pub fn with_provider(config: AppConfig, provider: Arc<dyn RevisionContentProvider>) -> Self {
        Self {
            config,
            provider,
            workers: num_cpus::get(),
        }
    }

    /// 完整的破坏性变更分析
    pub async fn analyze(&self) -> Result<AnalysisResult, AppError> {
        tracing::info!(
            "开始破坏性变更分析: {}..{}",
            self.config.base_ref,
            self.config.head_ref
        );

        let changed_files = self.provider.changed_files()?;
        if changed_files.is_empty() {
            tracing::info!("没有变更的 Python 文件，无需分析");
            return Ok(AnalysisResult::default());
        }
        tracing::info!("发现 {} 个变更文件", changed_files.len());

        let mut records = aggregate(
            &changed_files,
            Arc::clone(&self.provider),
            &self.config.base_ref,
            &self.config.head_ref,
            self.workers,
        )
        .await;
        tracing::info!("检测到 {} 条潜在破坏性变更", records.len());

        let candidate_files = collect_candidate_files(
            &self.config.repository_path,
            &self.config.include_patterns,
            &self.config.exclude_patterns,
            self.config.max_search_files,
        );
        let scanner = UsageScanner::new(
            Arc::new(FsReader::new(self.config.repository_path.clone())),
            self.workers,
        );
        let usage_locations = compute_impact(
            &mut records,
            &candidate_files,
            &scanner,
            &self.config.module_root_prefix,
        )
        .await;

        let exit_code = determine_exit_code(&records, &usage_locations, self.config.ignore_unused);

        Ok(AnalysisResult {
            total_files_analyzed: changed_files.len(),
            total_changes_detected: records.len(),
            breaking_changes: records,
            usage_locations,
            exit_code,
        })
    }
}

/// 根据检测结果决定退出码。
/// 0 = 无破坏性变更（或全部可忽略）；1 = 存在需要关注的变更。
/// 严重错误的退出码 2 由二进制入口在 `analyze` 返回 `Err` 时给出。
fn determine_exit_code(
    changes: &[ChangeRecord],
    usage_locations: &BTreeMap<String, Vec<UsageLocation>>,
    ignore_unused: bool,
) -> i32 {
    if changes.is_empty() {
        return 0;
    }

    let has_used_changes = changes
        .iter()
        .any(|c| usage_locations.contains_key(&c.usage_key()));

    if has_used_changes {
        let has_severe = changes
            .iter()
            .any(|c| matches!(c.severity, Severity::Critical | Severity::High));
        if has_severe {
            return 1;
        }
        return if ignore_unused { 0 } else { 1 };
    }

    // 有破坏性变更但没有检测到任何使用
    if ignore_unused {
        0
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaking_changes::ChangeKind;

    fn record(severity: Severity) -> ChangeRecord {
        ChangeRecord {
            kind: ChangeKind::ParameterBecameRequired,
            file_path: "m.py".to_string(),
            line: 1,
            element_name: "f".to_string(),
            old_signature: "f(a=1)".to_string(),
            new_signature: "f(a)".to_string(),
            description: "Parameter 'a' became required".to_string(),
            severity,
            confidence: 1.0,
            affected_files: Default::default(),
        }
    }

    fn usage_map_for(record: &ChangeRecord) -> BTreeMap<String, Vec<UsageLocation>> {
        let mut map = BTreeMap::new();
        map.insert(
            record.usage_key(),
            vec![UsageLocation {
                file_path: "consumer.py".to_string(),
                line: 3,
                context: "f()".to_string(),
                usage_kind: crate::usage_impact::UsageKind::FunctionCall,
            }],
        );
        map
    }

    #[test]
    fn test_no_changes_exits_zero() {
        assert_eq!(determine_exit_code(&[], &BTreeMap::new(), false), 0);
    }

    #[test]
    fn test_used_high_severity_exits_one() {
        let change = record(Severity::High);
        let map = usage_map_for(&change);
        assert_eq!(determine_exit_code(&[change], &map, false), 1);
    }

    #[test]
    fn test_used_high_severity_ignores_ignore_unused() {
        let change = record(Severity::High);
        let map = usage_map_for(&change);
        assert_eq!(determine_exit_code(&[change], &map, true), 1);
    }

    #[test]
    fn test_used_low_severity_respects_ignore_unused() {
        let change = record(Severity::Low);
        let map = usage_map_for(&change);
        assert_eq!(determine_exit_code(&[change], &map, true), 0);
        let change = record(Severity::Low);
        let map = usage_map_for(&change);
        assert_eq!(determine_exit_code(&[change], &map, false), 1);
    }

    #[test]
    fn test_unused_changes_respect_ignore_unused() {
        let change = record(Severity::High);
        assert_eq!(determine_exit_code(&[change], &BTreeMap::new(), true), 0);
        let change = record(Severity::High);
        assert_eq!(determine_exit_code(&[change], &BTreeMap::new(), false), 1);
    }
}
