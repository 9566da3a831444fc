// 应用配置 - 默认值 → TOML 配置文件 → APIDRIFT_* 环境变量 → 命令行参数
// 后写入的层覆盖先写入的层，最后统一校验

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::args::Args;
use crate::errors::ConfigError;

pub const CONFIG_FILE_NAME: &str = "apidrift.toml";

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// 对比的基准 git 引用
    pub base_ref: String,
    /// 对比的目标 git 引用
    pub head_ref: String,
    /// 仓库根目录
    pub repository_path: PathBuf,
    /// 忽略没有检测到使用的破坏性变更
    pub ignore_unused: bool,
    /// 参与分析的文件模式
    pub include_patterns: Vec<String>,
    /// 排除的文件模式
    pub exclude_patterns: Vec<String>,
    /// JSON 报告输出路径
    pub json_output: Option<PathBuf>,
    /// Markdown 报告输出路径
    pub markdown_output: Option<PathBuf>,
    /// 检测到破坏性变更时是否以非零退出码结束
    pub fail_on_breaking: bool,
    /// 使用扫描的候选文件上限
    pub max_search_files: usize,
    /// 推导模块路径时剥离的根目录前缀
    pub module_root_prefix: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_ref: "origin/main".to_string(),
            head_ref: "HEAD".to_string(),
            repository_path: PathBuf::from("."),
            ignore_unused: false,
            include_patterns: vec!["**/*.py".to_string()],
            exclude_patterns: vec![
                "**/test_*.py".to_string(),
                "**/tests/**/*.py".to_string(),
                "**/__pycache__/**".to_string(),
                "**/venv/**".to_string(),
                "**/.venv/**".to_string(),
                "**/site-packages/**".to_string(),
                "**/node_modules/**".to_string(),
            ],
            json_output: None,
            markdown_output: None,
            fail_on_breaking: true,
            max_search_files: 10_000,
            module_root_prefix: "src".to_string(),
        }
    }
}

/// TOML 配置文件的可选字段形态
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    pub base_ref: Option<String>,
    pub head_ref: Option<String>,
    pub repository_path: Option<PathBuf>,
    pub ignore_unused: Option<bool>,
    pub include_patterns: Option<Vec<String>>,
    pub exclude_patterns: Option<Vec<String>>,
    pub json_output: Option<PathBuf>,
    pub markdown_output: Option<PathBuf>,
    pub fail_on_breaking: Option<bool>,
    pub max_search_files: Option<usize>,
    pub module_root_prefix: Option<String>,
}

impl AppConfig {
    /// 按层叠顺序装配配置并校验
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_file(args)?;
        config.apply_environment(|key| std::env::var(key).ok());
        config.apply_args(args);
        config.validate()?;
        Ok(config)
    }

    fn apply_file(&mut self, args: &Args) -> Result<(), ConfigError> {
        let path = match &args.config {
            Some(path) => path.clone(),
            None => {
                let repo = args
                    .repository_path
                    .clone()
                    .unwrap_or_else(|| self.repository_path.clone());
                let default_path = repo.join(CONFIG_FILE_NAME);
                if !default_path.exists() {
                    return Ok(());
                }
                default_path
            }
        };

        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::FileRead(path.display().to_string(), e))?;
        let file_config: FileConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::TomlParse(path.display().to_string(), e))?;
        self.merge_file(file_config);
        tracing::debug!("已加载配置文件: {}", path.display());
        Ok(())
    }

    fn merge_file(&mut self, file: FileConfig) {
        if let Some(v) = file.base_ref {
            self.base_ref = v;
        }
        if let Some(v) = file.head_ref {
            self.head_ref = v;
        }
        if let Some(v) = file.repository_path {
            self.repository_path = v;
        }
        if let Some(v) = file.ignore_unused {
            self.ignore_unused = v;
        }
        if let Some(v) = file.include_patterns {
            self.include_patterns = v;
        }
        if let Some(v) = file.exclude_patterns {
            self.exclude_patterns = v;
        }
        if file.json_output.is_some() {
            self.json_output = file.json_output;
        }
        if file.markdown_output.is_some() {
            self.markdown_output = file.markdown_output;
        }
        if let Some(v) = file.fail_on_breaking {
            self.fail_on_breaking = v;
        }
        if let Some(v) = file.max_search_files {
            self.max_search_files = v;
        }
        if let Some(v) = file.module_root_prefix {
            self.module_root_prefix = v;
        }
    }

    /// 环境变量层；取值函数注入以便测试
    fn apply_environment<F: Fn(&str) -> Option<String>>(&mut self, get: F) {
        if let Some(v) = get("APIDRIFT_BASE_REF") {
            self.base_ref = v;
        }
        if let Some(v) = get("APIDRIFT_HEAD_REF") {
            self.head_ref = v;
        }
        if let Some(v) = get("APIDRIFT_REPO_PATH") {
            self.repository_path = PathBuf::from(v);
        }
        if let Some(v) = get("APIDRIFT_IGNORE_UNUSED") {
            self.ignore_unused = parse_bool(&v, self.ignore_unused);
        }
        if let Some(v) = get("APIDRIFT_INCLUDE_PATTERNS") {
            let patterns = split_patterns(&v);
            if !patterns.is_empty() {
                self.include_patterns = patterns;
            }
        }
        if let Some(v) = get("APIDRIFT_EXCLUDE_PATTERNS") {
            let patterns = split_patterns(&v);
            if !patterns.is_empty() {
                self.exclude_patterns = patterns;
            }
        }
        if let Some(v) = get("APIDRIFT_JSON_OUTPUT") {
            self.json_output = Some(PathBuf::from(v));
        }
        if let Some(v) = get("APIDRIFT_MARKDOWN_OUTPUT") {
            self.markdown_output = Some(PathBuf::from(v));
        }
        if let Some(v) = get("APIDRIFT_FAIL_ON_BREAKING") {
            self.fail_on_breaking = parse_bool(&v, self.fail_on_breaking);
        }
        if let Some(v) = get("APIDRIFT_MAX_SEARCH_FILES") {
            if let Ok(parsed) = v.parse::<usize>() {
                self.max_search_files = parsed;
            }
        }
        if let Some(v) = get("APIDRIFT_MODULE_ROOT_PREFIX") {
            self.module_root_prefix = v;
        }
    }

    fn apply_args(&mut self, args: &Args) {
        if let Some(v) = &args.base_ref {
            self.base_ref = v.clone();
        }
        if let Some(v) = &args.head_ref {
            self.head_ref = v.clone();
        }
        if let Some(v) = &args.repository_path {
            self.repository_path = v.clone();
        }
        if args.ignore_unused {
            self.ignore_unused = true;
        }
        if !args.include_patterns.is_empty() {
            self.include_patterns = args.include_patterns.clone();
        }
        if !args.exclude_patterns.is_empty() {
            self.exclude_patterns = args.exclude_patterns.clone();
        }
        if let Some(v) = &args.json_output {
            self.json_output = Some(v.clone());
        }
        if let Some(v) = &args.markdown_output {
            self.markdown_output = Some(v.clone());
        }
        if args.no_fail_on_breaking {
            self.fail_on_breaking = false;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.repository_path.exists() {
            return Err(ConfigError::RepositoryMissing(
                self.repository_path.display().to_string(),
            ));
        }
        if self.include_patterns.is_empty() {
            return Err(ConfigError::NoIncludePatterns);
        }
        if self.max_search_files == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_search_files".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_bool(value: &str, default: bool) -> bool {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => true,
        "false" | "0" | "no" | "off" => false,
        _ => default,
    }
}

fn split_patterns(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}
