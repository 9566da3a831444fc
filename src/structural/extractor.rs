// 结构提取器 - 将一个修订版本的源码解析为结构模型
// 源码文本的纯函数：同样的输入总是产出同样的模型

use std::collections::{BTreeMap, HashMap};

use tree_sitter::{Node, Parser};

use crate::errors::ExtractError;

use super::{
    ClassDescriptor, FunctionSignature, ImportDescriptor, StructuralModel, WILDCARD_IMPORT,
};

/// 解析一个文件版本，提取其公开接口。
///
/// 空白内容产出空模型；语法错误返回 [`ExtractError::Syntax`]，
/// 调用方应将其降级为空模型继续分析，而不是中断整个运行。
/// 仅建模顶层函数/类以及类体内一层的方法，更深的嵌套不属于公开接口。
pub fn extract(source: &str, file_path: &str) -> Result<StructuralModel, ExtractError> {
    if source.trim().is_empty() {
        return Ok(StructuralModel::empty());
    }

    let mut parser = Parser::new();
    parser
        .set_language(tree_sitter_python::language())
        .map_err(|e| ExtractError::Language(e.to_string()))?;

    let tree = parser.parse(source, None).ok_or_else(|| ExtractError::Parse {
        file: file_path.to_string(),
    })?;

    let root = tree.root_node();
    if root.has_error() {
        return Err(ExtractError::Syntax {
            file: file_path.to_string(),
        });
    }

    let mut model = StructuralModel::empty();
    let mut cursor = root.walk();
    for statement in root.named_children(&mut cursor) {
        collect_statement(statement, source, &mut model);
    }
    Ok(model)
}

fn collect_statement(node: Node, source: &str, model: &mut StructuralModel) {
    match node.kind() {
        "function_definition" => {
            let signature = extract_function(node, Vec::new(), source, None);
            model.functions.insert(signature.name.clone(), signature);
        }
        "class_definition" => {
            let class = extract_class(node, Vec::new(), source);
            model.classes.insert(class.name.clone(), class);
        }
        "decorated_definition" => {
            let decorators = extract_decorators(node, source);
            if let Some(definition) = node.child_by_field_name("definition") {
                match definition.kind() {
                    "function_definition" => {
                        let signature = extract_function(definition, decorators, source, None);
                        model.functions.insert(signature.name.clone(), signature);
                    }
                    "class_definition" => {
                        let class = extract_class(definition, decorators, source);
                        model.classes.insert(class.name.clone(), class);
                    }
                    _ => {}
                }
            }
        }
        "import_statement" => collect_plain_import(node, source, model),
        "import_from_statement" | "future_import_statement" => {
            collect_from_import(node, source, model)
        }
        "expression_statement" => collect_module_variables(node, source, model),
        _ => {}
    }
}

fn extract_function(
    node: Node,
    decorators: Vec<String>,
    source: &str,
    owning_class: Option<&str>,
) -> FunctionSignature {
    let name = node
        .child_by_field_name("name")
        .map(|n| node_text(n, source))
        .unwrap_or_default();

    let mut parameters = Vec::new();
    let mut defaults = HashMap::new();
    let mut annotations = HashMap::new();
    let mut vararg = None;
    let mut kwarg = None;

    if let Some(params) = node.child_by_field_name("parameters") {
        let mut cursor = params.walk();
        // `*` 之后的参数是 keyword-only，不属于位置参数列表
        let mut keyword_only = false;
        for param in params.named_children(&mut cursor) {
            match param.kind() {
                "identifier" => {
                    if !keyword_only {
                        parameters.push(node_text(param, source));
                    }
                }
                "default_parameter" => {
                    if keyword_only {
                        continue;
                    }
                    let Some(name_node) = param.child_by_field_name("name") else {
                        continue;
                    };
                    if name_node.kind() != "identifier" {
                        continue;
                    }
                    let param_name = node_text(name_node, source);
                    if let Some(value) = param.child_by_field_name("value") {
                        defaults.insert(param_name.clone(), node_text(value, source));
                    }
                    parameters.push(param_name);
                }
                "typed_parameter" => {
                    let Some(inner) = param.named_child(0) else {
                        continue;
                    };
                    let annotation = param
                        .child_by_field_name("type")
                        .map(|t| node_text(t, source));
                    match inner.kind() {
                        "identifier" => {
                            if keyword_only {
                                continue;
                            }
                            let param_name = node_text(inner, source);
                            if let Some(annotation) = annotation {
                                annotations.insert(param_name.clone(), annotation);
                            }
                            parameters.push(param_name);
                        }
                        "list_splat_pattern" => {
                            let splat_name = splat_name(inner, source);
                            if let (Some(n), Some(a)) = (&splat_name, annotation) {
                                annotations.insert(n.clone(), a);
                            }
                            vararg = splat_name;
                            keyword_only = true;
                        }
                        "dictionary_splat_pattern" => {
                            let splat_name = splat_name(inner, source);
                            if let (Some(n), Some(a)) = (&splat_name, annotation) {
                                annotations.insert(n.clone(), a);
                            }
                            kwarg = splat_name;
                        }
                        _ => {}
                    }
                }
                "typed_default_parameter" => {
                    if keyword_only {
                        continue;
                    }
                    let Some(name_node) = param.child_by_field_name("name") else {
                        continue;
                    };
                    let param_name = node_text(name_node, source);
                    if let Some(annotation) = param.child_by_field_name("type") {
                        annotations.insert(param_name.clone(), node_text(annotation, source));
                    }
                    if let Some(value) = param.child_by_field_name("value") {
                        defaults.insert(param_name.clone(), node_text(value, source));
                    }
                    parameters.push(param_name);
                }
                "list_splat_pattern" => {
                    vararg = splat_name(param, source);
                    keyword_only = true;
                }
                "dictionary_splat_pattern" => {
                    kwarg = splat_name(param, source);
                }
                "keyword_separator" => {
                    keyword_only = true;
                }
                // `/` 标记之前的参数已经记录过了
                "positional_separator" => {}
                _ => {}
            }
        }
    }

    let return_annotation = node
        .child_by_field_name("return_type")
        .map(|n| node_text(n, source));

    FunctionSignature {
        name,
        parameters,
        defaults,
        vararg,
        kwarg,
        annotations,
        return_annotation,
        decorators,
        is_method: owning_class.is_some(),
        owning_class: owning_class.map(|s| s.to_string()),
        line: node.start_position().row + 1,
    }
}

fn extract_class(node: Node, decorators: Vec<String>, source: &str) -> ClassDescriptor {
    let name = node
        .child_by_field_name("name")
        .map(|n| node_text(n, source))
        .unwrap_or_default();

    let mut bases = Vec::new();
    if let Some(superclasses) = node.child_by_field_name("superclasses") {
        let mut cursor = superclasses.walk();
        for base in superclasses.named_children(&mut cursor) {
            // 关键字实参（如 metaclass=...）不算基类
            if base.kind() != "keyword_argument" && base.kind() != "comment" {
                bases.push(node_text(base, source));
            }
        }
    }

    let mut methods = BTreeMap::new();
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for item in body.named_children(&mut cursor) {
            match item.kind() {
                "function_definition" => {
                    let method = extract_function(item, Vec::new(), source, Some(name.as_str()));
                    methods.insert(method.name.clone(), method);
                }
                "decorated_definition" => {
                    let method_decorators = extract_decorators(item, source);
                    if let Some(definition) = item.child_by_field_name("definition") {
                        if definition.kind() == "function_definition" {
                            let method = extract_function(
                                definition,
                                method_decorators,
                                source,
                                Some(name.as_str()),
                            );
                            methods.insert(method.name.clone(), method);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    ClassDescriptor {
        name,
        bases,
        decorators,
        line: node.start_position().row + 1,
        methods,
    }
}

fn extract_decorators(node: Node, source: &str) -> Vec<String> {
    let mut decorators = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "decorator" {
            // 取 @ 后面的表达式文本
            if let Some(expression) = child.named_child(0) {
                decorators.push(node_text(expression, source));
            }
        }
    }
    decorators
}

fn collect_plain_import(node: Node, source: &str, model: &mut StructuralModel) {
    let mut imported_names = Vec::new();
    let mut aliases = HashMap::new();

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "dotted_name" => imported_names.push(node_text(child, source)),
            "aliased_import" => {
                let Some(name_node) = child.child_by_field_name("name") else {
                    continue;
                };
                let original = node_text(name_node, source);
                if let Some(alias_node) = child.child_by_field_name("alias") {
                    aliases.insert(original.clone(), node_text(alias_node, source));
                }
                imported_names.push(original);
            }
            _ => {}
        }
    }

    let descriptor = ImportDescriptor {
        module: String::new(),
        imported_names: imported_names.clone(),
        aliases,
        is_from_import: false,
        line: node.start_position().row + 1,
    };
    for name in imported_names {
        model.imports.insert(name, descriptor.clone());
    }
}

fn collect_from_import(node: Node, source: &str, model: &mut StructuralModel) {
    let module = node
        .child_by_field_name("module_name")
        .map(|n| node_text(n, source))
        .unwrap_or_else(|| "__future__".to_string());

    let mut imported_names = Vec::new();
    let mut aliases = HashMap::new();

    let mut wildcard = false;
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "wildcard_import" {
            wildcard = true;
        }
    }

    if wildcard {
        imported_names.push(WILDCARD_IMPORT.to_string());
    } else {
        let mut cursor = node.walk();
        for name_node in node.children_by_field_name("name", &mut cursor) {
            match name_node.kind() {
                "dotted_name" => imported_names.push(node_text(name_node, source)),
                "aliased_import" => {
                    let Some(original_node) = name_node.child_by_field_name("name") else {
                        continue;
                    };
                    let original = node_text(original_node, source);
                    if let Some(alias_node) = name_node.child_by_field_name("alias") {
                        aliases.insert(original.clone(), node_text(alias_node, source));
                    }
                    imported_names.push(original);
                }
                _ => {}
            }
        }
    }

    let descriptor = ImportDescriptor {
        module,
        imported_names: imported_names.clone(),
        aliases,
        is_from_import: true,
        line: node.start_position().row + 1,
    };
    for name in imported_names {
        model.imports.insert(name, descriptor.clone());
    }
}

fn collect_module_variables(node: Node, source: &str, model: &mut StructuralModel) {
    let Some(expression) = node.named_child(0) else {
        return;
    };
    if expression.kind() != "assignment" {
        return;
    }
    let Some(left) = expression.child_by_field_name("left") else {
        return;
    };
    match left.kind() {
        "identifier" => {
            model
                .module_level_variable_names
                .insert(node_text(left, source));
        }
        "pattern_list" | "tuple_pattern" => {
            let mut cursor = left.walk();
            for target in left.named_children(&mut cursor) {
                if target.kind() == "identifier" {
                    model
                        .module_level_variable_names
                        .insert(node_text(target, source));
                }
            }
        }
        _ => {}
    }
}

fn splat_name(node: Node, source: &str) -> Option<String> {
    node.named_child(0).map(|n| node_text(n, source))
}

fn node_text(node: Node, source: &str) -> String {
    node.utf8_text(source.as_bytes())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_source_yields_empty_model() {
        let model = extract("", "m.py").unwrap();
        assert!(model.is_empty());
        let model = extract("   \n\t\n", "m.py").unwrap();
        assert!(model.is_empty());
    }

    #[test]
    fn test_syntax_error_is_reported() {
        let result = extract("def broken(:\n    pass\n", "m.py");
        assert!(matches!(result, Err(ExtractError::Syntax { .. })));
    }

    #[test]
    fn test_function_parameters_defaults_and_annotations() {
        let source = "def connect(host: str, port: int = 22, *args, **kwargs) -> bool:\n    pass\n";
        let model = extract(source, "m.py").unwrap();
        let sig = &model.functions["connect"];
        assert_eq!(sig.parameters, vec!["host", "port"]);
        assert_eq!(sig.defaults.get("port").map(|s| s.as_str()), Some("22"));
        assert_eq!(sig.annotations.get("host").map(|s| s.as_str()), Some("str"));
        assert_eq!(sig.vararg.as_deref(), Some("args"));
        assert_eq!(sig.kwarg.as_deref(), Some("kwargs"));
        assert_eq!(sig.return_annotation.as_deref(), Some("bool"));
        assert_eq!(sig.line, 1);
    }

    #[test]
    fn test_keyword_only_parameters_are_not_positional() {
        let source = "def f(a, *, b, c=1):\n    pass\n";
        let model = extract(source, "m.py").unwrap();
        let sig = &model.functions["f"];
        assert_eq!(sig.parameters, vec!["a"]);
        assert!(sig.defaults.is_empty());
    }

    #[test]
    fn test_async_function_is_extracted() {
        let source = "async def fetch(url):\n    pass\n";
        let model = extract(source, "m.py").unwrap();
        assert!(model.functions.contains_key("fetch"));
    }

    #[test]
    fn test_decorators_are_literal_text() {
        let source = "@app.route('/x')\n@cached\ndef handler(request):\n    pass\n";
        let model = extract(source, "m.py").unwrap();
        let sig = &model.functions["handler"];
        assert_eq!(sig.decorators, vec!["app.route('/x')", "cached"]);
    }

    #[test]
    fn test_class_with_methods_one_level_deep() {
        let source = "\
class Client(Base):
    def __init__(self, host):
        pass

    @property
    def host(self):
        return self._host

    def helper(self):
        def nested():
            pass
        return nested
";
        let model = extract(source, "m.py").unwrap();
        let class = &model.classes["Client"];
        assert_eq!(class.bases, vec!["Base"]);
        assert_eq!(class.methods.len(), 3);
        let init = &class.methods["__init__"];
        assert!(init.is_method);
        assert_eq!(init.owning_class.as_deref(), Some("Client"));
        assert_eq!(init.parameters, vec!["self", "host"]);
        assert_eq!(class.methods["host"].decorators, vec!["property"]);
        // 方法体内嵌套的函数不建模
        assert!(!model.functions.contains_key("nested"));
    }

    #[test]
    fn test_module_function_and_method_are_separate() {
        let source = "\
def run():
    pass

class Task:
    def run(self):
        pass
";
        let model = extract(source, "m.py").unwrap();
        assert!(model.functions.contains_key("run"));
        assert!(model.classes["Task"].methods.contains_key("run"));
        assert!(!model.functions["run"].is_method);
    }

    #[test]
    fn test_duplicate_method_last_declaration_wins() {
        let source = "\
class C:
    def m(self, a):
        pass

    def m(self, a, b):
        pass
";
        let model = extract(source, "m.py").unwrap();
        let method = &model.classes["C"].methods["m"];
        assert_eq!(method.parameters, vec!["self", "a", "b"]);
    }

    #[test]
    fn test_imports_with_aliases() {
        let source = "\
import os.path
import numpy as np
from collections import OrderedDict as OD, defaultdict
from utils.helpers import *
";
        let model = extract(source, "m.py").unwrap();

        assert!(!model.imports["os.path"].is_from_import);
        assert_eq!(
            model.imports["numpy"].aliases.get("numpy").map(|s| s.as_str()),
            Some("np")
        );

        let from_import = &model.imports["OrderedDict"];
        assert!(from_import.is_from_import);
        assert_eq!(from_import.module, "collections");
        assert_eq!(
            from_import.aliases.get("OrderedDict").map(|s| s.as_str()),
            Some("OD")
        );
        assert!(model.imports.contains_key("defaultdict"));

        let wildcard = &model.imports[WILDCARD_IMPORT];
        assert_eq!(wildcard.module, "utils.helpers");
        assert_eq!(wildcard.imported_names, vec![WILDCARD_IMPORT]);
    }

    #[test]
    fn test_module_level_variables() {
        let source = "\
TIMEOUT = 30
a, b = 1, 2

def f():
    local_var = 1
";
        let model = extract(source, "m.py").unwrap();
        assert!(model.module_level_variable_names.contains("TIMEOUT"));
        assert!(model.module_level_variable_names.contains("a"));
        assert!(model.module_level_variable_names.contains("b"));
        assert!(!model.module_level_variable_names.contains("local_var"));
    }

    #[test]
    fn test_extract_is_deterministic() {
        let source = "def f(a, b=1):\n    pass\n\nclass C:\n    def m(self):\n        pass\n";
        let first = extract(source, "m.py").unwrap();
        let second = extract(source, "m.py").unwrap();
        assert_eq!(first, second);
    }
}
