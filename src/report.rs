// 报告生成 - 控制台、JSON、Markdown 三种输出
// 核心分析不关心序列化格式，这里是唯一的展示层

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::json;

use crate::breaking_changes::{AnalysisResult, ChangeRecord, Severity};
use crate::config::AppConfig;
use crate::errors::AppError;

const SEVERITY_ORDER: [Severity; 4] = [
    Severity::Critical,
    Severity::High,
    Severity::Medium,
    Severity::Low,
];

pub struct ReportGenerator {
    config: AppConfig,
}

impl ReportGenerator {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// 控制台报告，始终生成
    pub fn generate_console_report(&self, result: &AnalysisResult) {
        println!("\n{}", "=".repeat(80));
        println!("🔍 破坏性变更分析报告");
        println!("{}", "=".repeat(80));

        println!("\n分析文件数: {}", result.total_files_analyzed);
        println!("检测到变更: {}", result.total_changes_detected);

        if result.breaking_changes.is_empty() {
            println!("\n✅ 未检测到破坏性变更");
        } else {
            println!("\n📋 检测到的破坏性变更:");
            println!("{}", "-".repeat(50));

            let by_severity = group_by_severity(&result.breaking_changes);
            for severity in SEVERITY_ORDER {
                let Some(changes) = by_severity.get(&severity) else {
                    continue;
                };
                println!(
                    "\n{} {} ({} 条)",
                    severity.emoji(),
                    severity.as_str().to_uppercase(),
                    changes.len()
                );
                for change in changes {
                    println!(
                        "  {}:{} {} — {}",
                        change.file_path, change.line, change.element_name, change.description
                    );
                    println!("    旧: {}", change.old_signature);
                    println!("    新: {}", change.new_signature);
                    if !change.affected_files.is_empty() {
                        let affected: Vec<&str> =
                            change.affected_files.iter().map(|s| s.as_str()).collect();
                        println!("    受影响文件: {}", affected.join(", "));
                    }
                }
            }
        }

        if !result.usage_locations.is_empty() {
            let total: usize = result.usage_locations.values().map(|v| v.len()).sum();
            println!("\n🎯 使用影响: {} 个元素共 {} 处引用", result.usage_locations.len(), total);
        }

        self.print_recommendations(result);
        println!("\n{}", "=".repeat(80));
    }

    fn print_recommendations(&self, result: &AnalysisResult) {
        if result.breaking_changes.is_empty() {
            return;
        }
        println!("\n💡 建议:");
        let has_severe = result
            .breaking_changes
            .iter()
            .any(|c| matches!(c.severity, Severity::Critical | Severity::High));
        if has_severe {
            println!("  - 考虑先以 deprecated 方式过渡，再移除旧接口");
            println!("  - 为受影响的调用方提供迁移说明");
        }
        if result
            .breaking_changes
            .iter()
            .any(|c| !c.affected_files.is_empty())
        {
            println!("  - 检测到实际使用点，合并前请确认这些调用方已同步修改");
        }
    }

    /// JSON 报告，写入指定路径
    pub fn generate_json_report(
        &self,
        result: &AnalysisResult,
        output_path: &Path,
    ) -> Result<(), AppError> {
        tracing::info!("生成 JSON 报告: {}", output_path.display());

        let report = json!({
            "metadata": {
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "analysis_version": env!("CARGO_PKG_VERSION"),
                "repository_path": self.config.repository_path.display().to_string(),
                "base_ref": self.config.base_ref,
                "head_ref": self.config.head_ref,
                "total_files_analyzed": result.total_files_analyzed,
                "total_changes_detected": result.total_changes_detected,
                "exit_code": result.exit_code,
            },
            "breaking_changes": result.breaking_changes,
            "usage_locations": result.usage_locations,
            "summary": {
                "by_severity": summarize_by_severity(&result.breaking_changes),
                "by_type": summarize_by_type(&result.breaking_changes),
                "files_with_changes": files_with_changes(&result.breaking_changes),
                "total_usage_locations": result
                    .usage_locations
                    .values()
                    .map(|v| v.len())
                    .sum::<usize>(),
            },
        });

        write_report(output_path, &serde_json::to_string_pretty(&report).map_err(
            |e| AppError::Generic(format!("JSON serialization failed: {}", e)),
        )?)
    }

    /// Markdown 报告，写入指定路径
    pub fn generate_markdown_report(
        &self,
        result: &AnalysisResult,
        output_path: &Path,
    ) -> Result<(), AppError> {
        tracing::info!("生成 Markdown 报告: {}", output_path.display());

        let mut md = String::new();
        md.push_str("# 破坏性变更分析报告\n\n");
        md.push_str(&format!(
            "- 对比范围: `{}` → `{}`\n- 分析文件数: {}\n- 检测到变更: {}\n- 生成时间: {}\n\n",
            self.config.base_ref,
            self.config.head_ref,
            result.total_files_analyzed,
            result.total_changes_detected,
            chrono::Utc::now().to_rfc3339(),
        ));

        if result.breaking_changes.is_empty() {
            md.push_str("✅ 未检测到破坏性变更。\n");
            return write_report(output_path, &md);
        }

        let by_severity = group_by_severity(&result.breaking_changes);
        for severity in SEVERITY_ORDER {
            let Some(changes) = by_severity.get(&severity) else {
                continue;
            };
            md.push_str(&format!(
                "## {} {}\n\n",
                severity.emoji(),
                severity.as_str().to_uppercase()
            ));
            for change in changes {
                md.push_str(&format!(
                    "### `{}` ({}:{})\n\n{}\n\n",
                    change.element_name, change.file_path, change.line, change.description
                ));
                md.push_str(&format!(
                    "```\n- {}\n+ {}\n```\n\n",
                    change.old_signature, change.new_signature
                ));
                let key = change.usage_key();
                if let Some(locations) = result.usage_locations.get(&key) {
                    md.push_str(&format!("{} 处引用:\n\n", locations.len()));
                    for location in locations {
                        md.push_str(&format!(
                            "- `{}:{}` ({})\n",
                            location.file_path,
                            location.line,
                            location.usage_kind.as_str()
                        ));
                    }
                    md.push('\n');
                }
            }
        }

        write_report(output_path, &md)
    }
}

fn write_report(path: &Path, content: &str) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::IO(format!("creating directory {}", parent.display()), e)
            })?;
        }
    }
    std::fs::write(path, content)
        .map_err(|e| AppError::IO(format!("writing report {}", path.display()), e))
}

fn group_by_severity(changes: &[ChangeRecord]) -> BTreeMap<Severity, Vec<&ChangeRecord>> {
    let mut grouped: BTreeMap<Severity, Vec<&ChangeRecord>> = BTreeMap::new();
    for change in changes {
        grouped.entry(change.severity).or_default().push(change);
    }
    grouped
}

fn summarize_by_severity(changes: &[ChangeRecord]) -> BTreeMap<String, usize> {
    let mut summary = BTreeMap::new();
    for change in changes {
        *summary.entry(change.severity.as_str().to_string()).or_insert(0) += 1;
    }
    summary
}

fn summarize_by_type(changes: &[ChangeRecord]) -> BTreeMap<String, usize> {
    let mut summary = BTreeMap::new();
    for change in changes {
        *summary
            .entry(change.kind.description().to_string())
            .or_insert(0) += 1;
    }
    summary
}

fn files_with_changes(changes: &[ChangeRecord]) -> Vec<String> {
    let mut files: Vec<String> = changes.iter().map(|c| c.file_path.clone()).collect();
    files.sort();
    files.dedup();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaking_changes::ChangeKind;
    use crate::usage_impact::{UsageKind, UsageLocation};

    fn sample_result() -> AnalysisResult {
        let change = ChangeRecord {
            kind: ChangeKind::ParameterBecameRequired,
            file_path: "net/ssh.py".to_string(),
            line: 1,
            element_name: "connect".to_string(),
            old_signature: "connect(host, port = 22)".to_string(),
            new_signature: "connect(host, port)".to_string(),
            description: "Parameter 'port' became required (default value removed)".to_string(),
            severity: Severity::High,
            confidence: 1.0,
            affected_files: ["consumer.py".to_string()].into_iter().collect(),
        };
        let mut usage_locations = BTreeMap::new();
        usage_locations.insert(
            change.usage_key(),
            vec![UsageLocation {
                file_path: "consumer.py".to_string(),
                line: 3,
                context: "connect('db')".to_string(),
                usage_kind: UsageKind::FunctionCall,
            }],
        );
        AnalysisResult {
            breaking_changes: vec![change],
            usage_locations,
            total_files_analyzed: 1,
            total_changes_detected: 1,
            exit_code: 1,
        }
    }

    #[test]
    fn test_json_report_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/report.json");
        let generator = ReportGenerator::new(AppConfig::default());

        generator
            .generate_json_report(&sample_result(), &path)
            .unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["metadata"]["total_changes_detected"], 1);
        assert_eq!(parsed["summary"]["by_severity"]["high"], 1);
        assert_eq!(
            parsed["breaking_changes"][0]["kind"],
            "parameter_became_required"
        );
        assert_eq!(
            parsed["usage_locations"]["net/ssh.py:connect"][0]["usage_kind"],
            "function_call"
        );
    }

    #[test]
    fn test_markdown_report_lists_changes_and_usages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.md");
        let generator = ReportGenerator::new(AppConfig::default());

        generator
            .generate_markdown_report(&sample_result(), &path)
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("## ⚠️ HIGH"));
        assert!(content.contains("`connect` (net/ssh.py:1)"));
        assert!(content.contains("consumer.py:3"));
    }

    #[test]
    fn test_console_report_does_not_panic() {
        let generator = ReportGenerator::new(AppConfig::default());
        generator.generate_console_report(&sample_result());
        generator.generate_console_report(&AnalysisResult::default());
    }

    #[test]
    fn test_summaries() {
        let result = sample_result();
        let by_type = summarize_by_type(&result.breaking_changes);
        assert_eq!(by_type.get("parameter became required"), Some(&1));
        assert_eq!(
            files_with_changes(&result.breaking_changes),
            vec!["net/ssh.py"]
        );
    }
}
