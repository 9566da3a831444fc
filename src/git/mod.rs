// 修订内容提供者 - 围绕 git 命令的窄接口
// 核心分析只依赖这里的 trait，测试用内存实现替换

use std::path::PathBuf;
use std::process::Command;

use crate::errors::GitError;

/// 修订内容提供能力：列出变更文件，取某个修订下的文件文本。
/// 文件在该修订不存在时返回空串，不算错误；只有修订不可达或
/// 底层命令失败才返回 `Err`。
pub trait RevisionContentProvider: Send + Sync {
    fn changed_files(&self) -> Result<Vec<String>, GitError>;
    fn content_at(&self, file_path: &str, revision: &str) -> Result<String, GitError>;
}

/// 通过 git 子进程实现的内容提供者
pub struct GitContentProvider {
    repo_path: PathBuf,
    base_ref: String,
    head_ref: String,
    include_patterns: Vec<String>,
    exclude_patterns: Vec<String>,
}

impl GitContentProvider {
    pub fn new(
        repo_path: PathBuf,
        base_ref: String,
        head_ref: String,
        include_patterns: Vec<String>,
        exclude_patterns: Vec<String>,
    ) -> Self {
        Self {
            repo_path,
            base_ref,
            head_ref,
            include_patterns,
            exclude_patterns,
        }
    }

    fn run_git(&self, args: &[&str]) -> Result<String, GitError> {
        let output = Command::new("git")
            .current_dir(&self.repo_path)
            .args(args)
            .output()
            .map_err(GitError::Spawn)?;

        if !output.status.success() {
            return Err(GitError::CommandFailed {
                command: format!("git {}", args.join(" ")),
                status_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn validate_reference(&self, reference: &str) -> Result<(), GitError> {
        self.run_git(&["rev-parse", "--verify", reference])
            .map(|_| ())
            .map_err(|_| GitError::InvalidReference(reference.to_string()))
    }
}

impl RevisionContentProvider for GitContentProvider {
    fn changed_files(&self) -> Result<Vec<String>, GitError> {
        self.validate_reference(&self.base_ref)?;
        self.validate_reference(&self.head_ref)?;

        let output = self.run_git(&[
            "diff",
            "--name-status",
            "--diff-filter=AMR",
            &self.base_ref,
            &self.head_ref,
        ])?;

        let files: Vec<String> = parse_name_status(&output)
            .into_iter()
            .filter(|f| is_python_file(f))
            .filter(|f| should_include(f, &self.include_patterns, &self.exclude_patterns))
            .collect();

        tracing::info!("发现 {} 个变更的 Python 文件", files.len());
        Ok(files)
    }

    fn content_at(&self, file_path: &str, revision: &str) -> Result<String, GitError> {
        match self.run_git(&["show", &format!("{}:{}", revision, file_path)]) {
            Ok(content) => Ok(content),
            Err(GitError::CommandFailed { stderr, .. })
                if stderr.contains("does not exist")
                    || stderr.contains("exists on disk, but not in") =>
            {
                Ok(String::new())
            }
            Err(e) => Err(e),
        }
    }
}

/// 解析 `git diff --name-status` 输出；重命名取新路径
fn parse_name_status(output: &str) -> Vec<String> {
    let mut files = Vec::new();
    for line in output.lines() {
        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() < 2 {
            continue;
        }
        let status = parts[0];
        let file_path = if status.starts_with('R') && parts.len() >= 3 {
            parts[2]
        } else {
            parts[1]
        };
        files.push(file_path.to_string());
    }
    files
}

fn is_python_file(path: &str) -> bool {
    path.ends_with(".py") || path.ends_with(".pyi")
}

fn should_include(path: &str, include_patterns: &[String], exclude_patterns: &[String]) -> bool {
    let matches = |patterns: &[String]| {
        patterns.iter().any(|p| {
            glob::Pattern::new(p)
                .map(|pattern| pattern.matches(path))
                .unwrap_or(false)
        })
    };
    if matches(exclude_patterns) {
        return false;
    }
    matches(include_patterns)
}
