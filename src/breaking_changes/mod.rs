// 破坏性变更记录类型 - 共享的数据结构，避免模块间循环依赖

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::usage_impact::UsageLocation;

pub mod aggregator;
pub mod signature_diff;

pub use aggregator::aggregate;
pub use signature_diff::diff;

/// 可检测的破坏性变更类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    FunctionRemoved,
    MethodRemoved,
    ClassRemoved,
    ParameterRemoved,
    SignatureReordered,
    ParameterBecameRequired,
    ParameterBecameOptional,
    DefaultValueChanged,
    ReturnTypeChanged,
    ReturnTypeAdded,
    ReturnTypeRemoved,
    ParamAnnotationChanged,
    ParamAnnotationAdded,
    ParamAnnotationRemoved,
}

impl ChangeKind {
    /// 变更类型的展示名称
    pub fn description(&self) -> &'static str {
        match self {
            ChangeKind::FunctionRemoved => "function removed",
            ChangeKind::MethodRemoved => "method removed",
            ChangeKind::ClassRemoved => "class removed",
            ChangeKind::ParameterRemoved => "parameter removed",
            ChangeKind::SignatureReordered => "parameter order changed",
            ChangeKind::ParameterBecameRequired => "parameter became required",
            ChangeKind::ParameterBecameOptional => "parameter became optional",
            ChangeKind::DefaultValueChanged => "default value changed",
            ChangeKind::ReturnTypeChanged => "return type changed",
            ChangeKind::ReturnTypeAdded => "return type added",
            ChangeKind::ReturnTypeRemoved => "return type removed",
            ChangeKind::ParamAnnotationChanged => "parameter annotation changed",
            ChangeKind::ParamAnnotationAdded => "parameter annotation added",
            ChangeKind::ParamAnnotationRemoved => "parameter annotation removed",
        }
    }
}

/// 严重级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Severity::Critical => "🚨",
            Severity::High => "⚠️",
            Severity::Medium => "⚡",
            Severity::Low => "💡",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一条检测到的破坏性变更。
/// 由签名差异比较创建；`affected_files` 是唯一在创建后被修改的字段，
/// 且只由影响协调器写入。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub kind: ChangeKind,
    pub file_path: String,
    pub line: usize,
    /// 元素名；方法记录为 `Class.method`
    pub element_name: String,
    pub old_signature: String,
    pub new_signature: String,
    pub description: String,
    pub severity: Severity,
    /// 结构化比对产生的记录置信度恒为 1.0
    pub confidence: f32,
    /// 检测到使用该元素的文件集合，由影响协调器填充
    pub affected_files: BTreeSet<String>,
}

impl ChangeRecord {
    pub fn usage_key(&self) -> String {
        format!("{}:{}", self.file_path, self.element_name)
    }
}

/// 完整的分析结果，交给报告层输出
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub breaking_changes: Vec<ChangeRecord>,
    /// `"<file>:<element>"` 到使用位置列表的映射
    pub usage_locations: BTreeMap<String, Vec<UsageLocation>>,
    pub total_files_analyzed: usize,
    pub total_changes_detected: usize,
    pub exit_code: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_severity_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Severity::High).unwrap(), "\"high\"");
    }

    #[test]
    fn test_change_kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ChangeKind::ParameterBecameRequired).unwrap(),
            "\"parameter_became_required\""
        );
    }
}
