// 使用影响分析的共享类型

use serde::{Deserialize, Serialize};

pub mod coordinator;
pub mod patterns;
pub mod scanner;

pub use coordinator::compute_impact;
pub use patterns::generate_patterns;
pub use scanner::{collect_candidate_files, ContentReader, FsReader, UsageScanner};

/// 引用方式分类，随使用位置一起输出到报告
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageKind {
    DirectImport,
    ModuleImport,
    QualifiedUsage,
    FunctionCall,
    ClassInstantiation,
    AttributeAccess,
    MethodCall,
    StarImport,
    NameReference,
}

impl UsageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageKind::DirectImport => "direct_import",
            UsageKind::ModuleImport => "module_import",
            UsageKind::QualifiedUsage => "qualified_usage",
            UsageKind::FunctionCall => "function_call",
            UsageKind::ClassInstantiation => "class_instantiation",
            UsageKind::AttributeAccess => "attribute_access",
            UsageKind::MethodCall => "method_call",
            UsageKind::StarImport => "star_import",
            UsageKind::NameReference => "name_reference",
        }
    }
}

/// 代码库中一处疑似引用变更元素的位置。不可变值。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageLocation {
    pub file_path: String,
    pub line: usize,
    /// 匹配行附近的源码窗口
    pub context: String,
    pub usage_kind: UsageKind,
}

/// 描述变更元素可能被引用方式的一条搜索模式
#[derive(Debug, Clone)]
pub struct SearchPattern {
    /// 行级正则表达式文本
    pub pattern: String,
    pub usage_kind: UsageKind,
    pub element_name: String,
}
