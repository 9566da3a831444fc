// 签名差异比较 - 对同一逻辑文件的新旧结构模型做纯粹的成对比较
// 无状态：文件之间不保留任何信息

use crate::structural::{FunctionSignature, StructuralModel};

use super::{ChangeKind, ChangeRecord, Severity};

/// 比较新旧两个结构模型，产出该文件的全部变更记录。
///
/// 五个检查按固定顺序执行：函数删除、函数签名变更、类删除、
/// 类方法变更、导入变更（当前保留为空，见 [`import_changes`]）。
/// 文件在某侧不存在时传入空模型即可，"全部删除/全部新增"自然落入
/// 前三个检查，无需特殊分支。
pub fn diff(old: &StructuralModel, new: &StructuralModel, file_path: &str) -> Vec<ChangeRecord> {
    let mut records = Vec::new();
    records.extend(removed_functions(old, new, file_path));
    records.extend(function_signature_changes(old, new, file_path));
    records.extend(removed_classes(old, new, file_path));
    records.extend(class_method_changes(old, new, file_path));
    records.extend(import_changes(old, new, file_path));
    records
}

fn removed_functions(
    old: &StructuralModel,
    new: &StructuralModel,
    file_path: &str,
) -> Vec<ChangeRecord> {
    let mut records = Vec::new();
    for (name, old_func) in &old.functions {
        if !new.functions.contains_key(name) {
            records.push(ChangeRecord {
                kind: ChangeKind::FunctionRemoved,
                file_path: file_path.to_string(),
                line: old_func.line,
                element_name: name.clone(),
                old_signature: old_func.format(),
                new_signature: "<removed>".to_string(),
                description: format!("Function '{}' was removed", name),
                severity: Severity::High,
                confidence: 1.0,
                affected_files: Default::default(),
            });
        }
    }
    records
}

fn function_signature_changes(
    old: &StructuralModel,
    new: &StructuralModel,
    file_path: &str,
) -> Vec<ChangeRecord> {
    let mut records = Vec::new();
    for (name, old_func) in &old.functions {
        let Some(new_func) = new.functions.get(name) else {
            continue;
        };
        for change in compare_signatures(old_func, new_func) {
            records.push(ChangeRecord {
                kind: change.kind,
                file_path: file_path.to_string(),
                line: new_func.line,
                element_name: name.clone(),
                old_signature: old_func.format(),
                new_signature: new_func.format(),
                description: change.description,
                severity: change.severity,
                confidence: 1.0,
                affected_files: Default::default(),
            });
        }
    }
    records
}

fn removed_classes(
    old: &StructuralModel,
    new: &StructuralModel,
    file_path: &str,
) -> Vec<ChangeRecord> {
    let mut records = Vec::new();
    for (name, old_class) in &old.classes {
        if !new.classes.contains_key(name) {
            records.push(ChangeRecord {
                kind: ChangeKind::ClassRemoved,
                file_path: file_path.to_string(),
                line: old_class.line,
                element_name: name.clone(),
                old_signature: old_class.format(),
                new_signature: "<removed>".to_string(),
                description: format!("Class '{}' was removed", name),
                severity: Severity::High,
                confidence: 1.0,
                affected_files: Default::default(),
            });
        }
    }
    records
}

fn class_method_changes(
    old: &StructuralModel,
    new: &StructuralModel,
    file_path: &str,
) -> Vec<ChangeRecord> {
    let mut records = Vec::new();
    for (class_name, old_class) in &old.classes {
        let Some(new_class) = new.classes.get(class_name) else {
            continue;
        };

        for (method_name, old_method) in &old_class.methods {
            if !new_class.methods.contains_key(method_name) {
                records.push(ChangeRecord {
                    kind: ChangeKind::MethodRemoved,
                    file_path: file_path.to_string(),
                    line: old_method.line,
                    element_name: format!("{}.{}", class_name, method_name),
                    old_signature: old_method.format(),
                    new_signature: "<removed>".to_string(),
                    description: format!(
                        "Method '{}' was removed from class '{}'",
                        method_name, class_name
                    ),
                    severity: Severity::High,
                    confidence: 1.0,
                    affected_files: Default::default(),
                });
            }
        }

        for (method_name, old_method) in &old_class.methods {
            let Some(new_method) = new_class.methods.get(method_name) else {
                continue;
            };
            for change in compare_signatures(old_method, new_method) {
                records.push(ChangeRecord {
                    kind: change.kind,
                    file_path: file_path.to_string(),
                    line: new_method.line,
                    element_name: format!("{}.{}", class_name, method_name),
                    old_signature: old_method.format(),
                    new_signature: new_method.format(),
                    description: format!(
                        "Method '{}' in class '{}': {}",
                        method_name, class_name, change.description
                    ),
                    severity: change.severity,
                    confidence: 1.0,
                    affected_files: Default::default(),
                });
            }
        }
    }
    records
}

/// 导入路径变更检查。
/// 目前只关注公开 API 变更；导入变更通常不影响外部调用方，
/// 保留此检查位用于将来的公开导出路径检测。
fn import_changes(
    _old: &StructuralModel,
    _new: &StructuralModel,
    _file_path: &str,
) -> Vec<ChangeRecord> {
    Vec::new()
}

struct SignatureChange {
    kind: ChangeKind,
    description: String,
    severity: Severity,
}

/// 比较同名函数的两个签名，产出零或多条变更。
fn compare_signatures(old: &FunctionSignature, new: &FunctionSignature) -> Vec<SignatureChange> {
    let mut changes = Vec::new();

    // 参数删除
    for param in &old.parameters {
        if !new.parameters.contains(param) {
            changes.push(SignatureChange {
                kind: ChangeKind::ParameterRemoved,
                description: format!("Parameter '{}' was removed", param),
                severity: Severity::High,
            });
        }
    }

    // 参数顺序：只看两侧都存在的参数的相对顺序。
    // 新增或删除参数本身另行报告，不触发顺序变更。
    if !old.parameters.is_empty() && !new.parameters.is_empty() {
        let old_order: Vec<&String> = old
            .parameters
            .iter()
            .filter(|p| new.parameters.contains(p))
            .collect();
        let new_order: Vec<&String> = new
            .parameters
            .iter()
            .filter(|p| old.parameters.contains(p))
            .collect();
        if old_order != new_order {
            changes.push(SignatureChange {
                kind: ChangeKind::SignatureReordered,
                description: "Parameter order changed".to_string(),
                severity: Severity::High,
            });
        }
    }

    // 必选/可选转换与默认值变更
    for param in &old.parameters {
        if !new.parameters.contains(param) {
            continue;
        }
        let old_default = old.defaults.get(param);
        let new_default = new.defaults.get(param);
        match (old_default, new_default) {
            (Some(_), None) => changes.push(SignatureChange {
                kind: ChangeKind::ParameterBecameRequired,
                description: format!("Parameter '{}' became required (default value removed)", param),
                severity: Severity::High,
            }),
            (None, Some(_)) => changes.push(SignatureChange {
                kind: ChangeKind::ParameterBecameOptional,
                description: format!("Parameter '{}' became optional (default value added)", param),
                severity: Severity::Low,
            }),
            (Some(old_value), Some(new_value)) if old_value != new_value => {
                changes.push(SignatureChange {
                    kind: ChangeKind::DefaultValueChanged,
                    description: format!("Default value for parameter '{}' changed", param),
                    severity: Severity::Medium,
                })
            }
            _ => {}
        }
    }

    // 返回类型注解的三向比较
    match (&old.return_annotation, &new.return_annotation) {
        (Some(old_ret), Some(new_ret)) if old_ret != new_ret => changes.push(SignatureChange {
            kind: ChangeKind::ReturnTypeChanged,
            description: format!(
                "Return type annotation changed from '{}' to '{}'",
                old_ret, new_ret
            ),
            severity: Severity::Medium,
        }),
        (Some(_), None) => changes.push(SignatureChange {
            kind: ChangeKind::ReturnTypeRemoved,
            description: "Return type annotation removed".to_string(),
            severity: Severity::Low,
        }),
        (None, Some(new_ret)) => changes.push(SignatureChange {
            kind: ChangeKind::ReturnTypeAdded,
            description: format!("Return type annotation added: '{}'", new_ret),
            severity: Severity::Low,
        }),
        _ => {}
    }

    // 共有参数的类型注解三向比较
    for param in &old.parameters {
        if !new.parameters.contains(param) {
            continue;
        }
        match (old.annotation_of(param), new.annotation_of(param)) {
            (Some(old_ann), Some(new_ann)) if old_ann != new_ann => {
                changes.push(SignatureChange {
                    kind: ChangeKind::ParamAnnotationChanged,
                    description: format!(
                        "Type annotation for parameter '{}' changed from '{}' to '{}'",
                        param, old_ann, new_ann
                    ),
                    severity: Severity::Medium,
                })
            }
            (Some(_), None) => changes.push(SignatureChange {
                kind: ChangeKind::ParamAnnotationRemoved,
                description: format!("Type annotation for parameter '{}' removed", param),
                severity: Severity::Low,
            }),
            (None, Some(new_ann)) => changes.push(SignatureChange {
                kind: ChangeKind::ParamAnnotationAdded,
                description: format!(
                    "Type annotation for parameter '{}' added: '{}'",
                    param, new_ann
                ),
                severity: Severity::Low,
            }),
            _ => {}
        }
    }

    changes
}
