// 使用扫描器 - 在候选文件中搜索变更元素的引用
// 两条独立的扫描路径：行级正则匹配 + 带导入别名追踪的结构遍历。
// 两条路径的结果直接拼接，跨路径的重复命中是预期行为：
// 这是一个偏召回的启发式工具，漏报比误报代价更高。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;
use regex::Regex;
use tree_sitter::{Node, Parser};
use walkdir::WalkDir;

use super::{SearchPattern, UsageKind, UsageLocation};

/// 文件内容读取能力。扫描器通过它访问候选文件，
/// 测试时可以注入内存实现而不需要真实目录树。
pub trait ContentReader: Send + Sync {
    fn read(&self, path: &str) -> std::io::Result<String>;
}

/// 基于文件系统的读取实现，路径相对仓库根目录解析
pub struct FsReader {
    root: PathBuf,
}

impl FsReader {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }
}

impl ContentReader for FsReader {
    fn read(&self, path: &str) -> std::io::Result<String> {
        std::fs::read_to_string(self.root.join(path))
    }
}

pub struct UsageScanner {
    reader: Arc<dyn ContentReader>,
    workers: usize,
    abort: Arc<AtomicBool>,
}

impl UsageScanner {
    pub fn new(reader: Arc<dyn ContentReader>, workers: usize) -> Self {
        Self {
            reader,
            workers: workers.max(1),
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 取消句柄：置位后不再派发新的单文件扫描，在途任务自然结束
    pub fn abort_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    /// 在候选文件中扫描全部模式，返回按 (文件, 行号) 排序的使用位置。
    /// 产生变更的文件自身不参与扫描（自引用不算使用）。
    pub async fn scan(
        &self,
        patterns: &[SearchPattern],
        candidate_files: &[String],
        exclude_file: &str,
    ) -> Vec<UsageLocation> {
        // 正则只编译一次；编译失败的单条模式跳过，其余照常执行
        let mut compiled = Vec::new();
        for pattern in patterns {
            match Regex::new(&pattern.pattern) {
                Ok(re) => compiled.push((re, pattern.usage_kind)),
                Err(e) => {
                    tracing::warn!("跳过无法编译的搜索模式 {}: {}", pattern.pattern, e);
                }
            }
        }
        let compiled = Arc::new(compiled);
        let patterns = Arc::new(patterns.to_vec());

        let files: Vec<String> = candidate_files
            .iter()
            .filter(|f| f.as_str() != exclude_file)
            .cloned()
            .collect();

        let results: Vec<Vec<UsageLocation>> = futures_util::stream::iter(files.into_iter().map(
            |file| {
                let reader = Arc::clone(&self.reader);
                let compiled = Arc::clone(&compiled);
                let patterns = Arc::clone(&patterns);
                let abort = Arc::clone(&self.abort);
                async move {
                    if abort.load(Ordering::Relaxed) {
                        return Vec::new();
                    }
                    match tokio::task::spawn_blocking(move || {
                        scan_file(reader.as_ref(), &file, &compiled, &patterns)
                    })
                    .await
                    {
                        Ok(locations) => locations,
                        Err(e) => {
                            tracing::warn!("单文件扫描任务失败: {}", e);
                            Vec::new()
                        }
                    }
                }
            },
        ))
        .buffer_unordered(self.workers)
        .collect()
        .await;

        let mut merged: Vec<UsageLocation> = results.into_iter().flatten().collect();
        merged.sort_by(|a, b| {
            a.file_path
                .cmp(&b.file_path)
                .then_with(|| a.line.cmp(&b.line))
        });
        merged
    }
}

fn scan_file(
    reader: &dyn ContentReader,
    file_path: &str,
    compiled: &[(Regex, UsageKind)],
    patterns: &[SearchPattern],
) -> Vec<UsageLocation> {
    let content = match reader.read(file_path) {
        Ok(content) => content,
        Err(e) => {
            tracing::debug!("读取 {} 失败，跳过: {}", file_path, e);
            return Vec::new();
        }
    };

    let mut locations = text_pass(file_path, &content, compiled);
    locations.extend(structural_pass(file_path, &content, patterns));
    locations
}

/// 行级正则扫描，上下文窗口为命中行前后各 2 行
fn text_pass(
    file_path: &str,
    content: &str,
    compiled: &[(Regex, UsageKind)],
) -> Vec<UsageLocation> {
    let lines: Vec<&str> = content.lines().collect();
    let mut locations = Vec::new();

    for (regex, usage_kind) in compiled {
        for (idx, line) in lines.iter().enumerate() {
            if regex.is_match(line) {
                locations.push(UsageLocation {
                    file_path: file_path.to_string(),
                    line: idx + 1,
                    context: context_window(&lines, idx, 2, 2),
                    usage_kind: *usage_kind,
                });
            }
        }
    }
    locations
}

/// 结构遍历扫描：解析失败时静默跳过（语法坏的文件只损失召回）
fn structural_pass(
    file_path: &str,
    content: &str,
    patterns: &[SearchPattern],
) -> Vec<UsageLocation> {
    if patterns.is_empty() {
        return Vec::new();
    }

    let mut parser = Parser::new();
    if parser.set_language(tree_sitter_python::language()).is_err() {
        return Vec::new();
    }
    let Some(tree) = parser.parse(content, None) else {
        return Vec::new();
    };
    if tree.root_node().has_error() {
        return Vec::new();
    }

    let mut visitor = StructuralVisitor {
        file_path,
        source: content,
        lines: content.lines().collect(),
        patterns,
        imports: HashMap::new(),
        usages: Vec::new(),
    };
    visitor.walk(tree.root_node());
    visitor.usages
}

/// 带导入绑定追踪的树遍历。
/// `import X as Y` 记作 Y→X，`from M import N as Y` 记作 Y→M.N；
/// 名称引用先经绑定解析成全限定形式，再做目标元素的子串判断。
struct StructuralVisitor<'a> {
    file_path: &'a str,
    source: &'a str,
    lines: Vec<&'a str>,
    patterns: &'a [SearchPattern],
    imports: HashMap<String, String>,
    usages: Vec<UsageLocation>,
}

impl<'a> StructuralVisitor<'a> {
    fn walk(&mut self, node: Node) {
        match node.kind() {
            "import_statement" => self.visit_import(node),
            "import_from_statement" | "future_import_statement" => self.visit_from_import(node),
            "call" => self.visit_call(node),
            "attribute" => self.visit_attribute(node),
            "identifier" => {
                let name = self.text(node);
                self.check(&name, node.start_position().row, UsageKind::NameReference);
            }
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.walk(child);
        }
    }

    fn visit_import(&mut self, node: Node) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "dotted_name" => {
                    let name = self.text(child);
                    self.imports.insert(name.clone(), name);
                }
                "aliased_import" => {
                    let Some(name_node) = child.child_by_field_name("name") else {
                        continue;
                    };
                    let original = self.text(name_node);
                    let local = child
                        .child_by_field_name("alias")
                        .map(|a| self.text(a))
                        .unwrap_or_else(|| original.clone());
                    self.imports.insert(local, original);
                }
                _ => {}
            }
        }
    }

    fn visit_from_import(&mut self, node: Node) {
        let module = node
            .child_by_field_name("module_name")
            .map(|n| self.text(n))
            .unwrap_or_default();

        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() == "wildcard_import" {
                // 通配符导入可能掩盖任何引用，无条件记为风险使用
                self.add_usage(node.start_position().row, UsageKind::StarImport);
                return;
            }
        }

        let mut cursor = node.walk();
        for name_node in node.children_by_field_name("name", &mut cursor) {
            let (original, local) = match name_node.kind() {
                "dotted_name" => {
                    let n = self.text(name_node);
                    (n.clone(), n)
                }
                "aliased_import" => {
                    let Some(original_node) = name_node.child_by_field_name("name") else {
                        continue;
                    };
                    let original = self.text(original_node);
                    let local = name_node
                        .child_by_field_name("alias")
                        .map(|a| self.text(a))
                        .unwrap_or_else(|| original.clone());
                    (original, local)
                }
                _ => continue,
            };
            let qualified = if module.is_empty() {
                original
            } else {
                format!("{}.{}", module, original)
            };
            self.imports.insert(local, qualified);
        }
    }

    fn visit_call(&mut self, node: Node) {
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };
        let row = node.start_position().row;
        match function.kind() {
            "identifier" => {
                let name = self.text(function);
                self.check(&name, row, UsageKind::FunctionCall);
            }
            "attribute" => {
                if let Some(dotted) = self.dotted_attribute(function) {
                    self.check(&dotted, row, UsageKind::MethodCall);
                }
                if let Some(attr) = function.child_by_field_name("attribute") {
                    let name = self.text(attr);
                    self.check(&name, row, UsageKind::MethodCall);
                }
            }
            _ => {}
        }
    }

    fn visit_attribute(&mut self, node: Node) {
        let row = node.start_position().row;
        if let Some(dotted) = self.dotted_attribute(node) {
            self.check(&dotted, row, UsageKind::AttributeAccess);
        }
        if let Some(attr) = node.child_by_field_name("attribute") {
            let name = self.text(attr);
            self.check(&name, row, UsageKind::AttributeAccess);
        }
    }

    /// `obj.attr` 形式；对象不是简单名称时返回 None
    fn dotted_attribute(&self, node: Node) -> Option<String> {
        let object = node.child_by_field_name("object")?;
        if object.kind() != "identifier" {
            return None;
        }
        let attr = node.child_by_field_name("attribute")?;
        Some(format!("{}.{}", self.text(object), self.text(attr)))
    }

    fn check(&mut self, name: &str, row: usize, usage_kind: UsageKind) {
        let qualified = self.resolve(name);
        let patterns = self.patterns;
        for pattern in patterns {
            if qualified.contains(pattern.element_name.as_str()) {
                self.add_usage(row, usage_kind);
                break;
            }
        }
    }

    /// 经导入绑定把本地名称解析为全限定形式
    fn resolve(&self, name: &str) -> String {
        if let Some(mapped) = self.imports.get(name) {
            return mapped.clone();
        }
        if let Some((base, rest)) = name.split_once('.') {
            if let Some(mapped) = self.imports.get(base) {
                return format!("{}.{}", mapped, rest);
            }
        }
        name.to_string()
    }

    fn add_usage(&mut self, row: usize, usage_kind: UsageKind) {
        self.usages.push(UsageLocation {
            file_path: self.file_path.to_string(),
            line: row + 1,
            context: context_window(&self.lines, row, 5, 2),
            usage_kind,
        });
    }

    fn text(&self, node: Node) -> String {
        node.utf8_text(self.source.as_bytes())
            .unwrap_or_default()
            .to_string()
    }
}

fn context_window(lines: &[&str], idx: usize, before: usize, after: usize) -> String {
    let start = idx.saturating_sub(before);
    let end = (idx + after + 1).min(lines.len());
    lines[start..end].join("\n")
}

/// 枚举仓库中参与使用扫描的候选文件。
/// 排除模式先于包含模式判定：命中任一排除模式的文件即使
/// 同时命中包含模式也会被丢弃。返回按路径排序的相对路径列表。
pub fn collect_candidate_files(
    repo_root: &Path,
    include_patterns: &[String],
    exclude_patterns: &[String],
    max_files: usize,
) -> Vec<String> {
    let include = compile_globs(include_patterns);
    let exclude = compile_globs(exclude_patterns);

    let mut files = Vec::new();
    let walker = WalkDir::new(repo_root).into_iter().filter_entry(|entry| {
        if entry.depth() == 0 {
            return true;
        }
        let name = entry.file_name().to_string_lossy();
        !(name.starts_with('.') || name == "__pycache__" || name == "node_modules")
    });

    for entry in walker.filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let is_python = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("py") | Some("pyi")
        );
        if !is_python {
            continue;
        }
        let Ok(relative) = path.strip_prefix(repo_root) else {
            continue;
        };
        let relative = relative.to_string_lossy().to_string();
        if should_search(&relative, &include, &exclude) {
            files.push(relative);
        }
    }

    files.sort();
    if files.len() > max_files {
        tracing::warn!(
            "候选文件 {} 个，超过上限 {}，截断后继续",
            files.len(),
            max_files
        );
        files.truncate(max_files);
    }
    files
}

fn compile_globs(patterns: &[String]) -> Vec<glob::Pattern> {
    let mut compiled = Vec::new();
    for pattern in patterns {
        match glob::Pattern::new(pattern) {
            Ok(p) => compiled.push(p),
            Err(e) => tracing::warn!("跳过无效的文件模式 {}: {}", pattern, e),
        }
    }
    compiled
}

fn should_search(path: &str, include: &[glob::Pattern], exclude: &[glob::Pattern]) -> bool {
    if exclude.iter().any(|p| p.matches(path)) {
        return false;
    }
    include.iter().any(|p| p.matches(path))
}
