// 使用模式生成 - 从一条变更记录推导元素可能被引用的搜索模式

use std::path::Path;

use super::{SearchPattern, UsageKind};

/// 为一个变更元素生成全部搜索模式。
///
/// 能推导出模块路径时额外生成 import/限定引用类模式；
/// 裸调用、属性访问模式始终生成；`Class.method` 形式的元素
/// 再生成一条方法调用模式。
pub fn generate_patterns(
    element_name: &str,
    source_file: &str,
    module_root_prefix: &str,
) -> Vec<SearchPattern> {
    let mut patterns = Vec::new();
    let escaped_element = regex::escape(element_name);

    if let Some(module_path) = module_path_for(source_file, module_root_prefix) {
        let escaped_module = regex::escape(&module_path);

        // from module.path import ... element
        patterns.push(SearchPattern {
            pattern: format!(
                r"from\s+{}\s+import\s+.*\b{}\b",
                escaped_module, escaped_element
            ),
            usage_kind: UsageKind::DirectImport,
            element_name: element_name.to_string(),
        });

        // import module.path
        patterns.push(SearchPattern {
            pattern: format!(r"import\s+{}", escaped_module),
            usage_kind: UsageKind::ModuleImport,
            element_name: element_name.to_string(),
        });

        // module.path.element
        patterns.push(SearchPattern {
            pattern: format!(r"{}\.{}\b", escaped_module, escaped_element),
            usage_kind: UsageKind::QualifiedUsage,
            element_name: element_name.to_string(),
        });

        // from module.path import *
        patterns.push(SearchPattern {
            pattern: format!(r"from\s+{}\s+import\s+\*", escaped_module),
            usage_kind: UsageKind::StarImport,
            element_name: element_name.to_string(),
        });
    }

    // 裸调用：element(
    patterns.push(SearchPattern {
        pattern: format!(r"\b{}\s*\(", escaped_element),
        usage_kind: UsageKind::FunctionCall,
        element_name: element_name.to_string(),
    });
    patterns.push(SearchPattern {
        pattern: format!(r"\b{}\s*\(", escaped_element),
        usage_kind: UsageKind::ClassInstantiation,
        element_name: element_name.to_string(),
    });

    // 属性访问：.element
    patterns.push(SearchPattern {
        pattern: format!(r"\.{}\b", escaped_element),
        usage_kind: UsageKind::AttributeAccess,
        element_name: element_name.to_string(),
    });

    // Class.method 形式：ClassName(...).method(
    if let Some((class_name, method_name)) = element_name.rsplit_once('.') {
        patterns.push(SearchPattern {
            pattern: format!(
                r"\b{}\s*\([^)]*\)\.{}\s*\(",
                regex::escape(class_name),
                regex::escape(method_name)
            ),
            usage_kind: UsageKind::MethodCall,
            element_name: element_name.to_string(),
        });
    }

    patterns
}

/// 把文件路径转换为 Python 模块点分路径。
///
/// 去掉扩展名，路径分隔符换成点；遇到非标识符的路径段就截断；
/// 去掉开头的根前缀（通常是 `src`）。这是尽力而为的启发式推导，
/// 不做构建系统级的解析。
pub fn module_path_for(file_path: &str, module_root_prefix: &str) -> Option<String> {
    let path = Path::new(file_path);
    let stripped = match path.extension().and_then(|e| e.to_str()) {
        Some("py") | Some("pyi") => path.with_extension(""),
        _ => path.to_path_buf(),
    };

    let mut parts = Vec::new();
    for component in stripped.components() {
        let Some(segment) = component.as_os_str().to_str() else {
            break;
        };
        if segment == ".." || segment == "." {
            continue;
        }
        if is_identifier(segment) {
            parts.push(segment.to_string());
        } else {
            break;
        }
    }

    if parts.is_empty() {
        return None;
    }

    if !module_root_prefix.is_empty() && parts.first().map(|s| s.as_str()) == Some(module_root_prefix)
    {
        parts.remove(0);
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("."))
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}
