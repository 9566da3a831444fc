use std::path::PathBuf;

use clap::Parser;

/// apidrift - 检测 Python 代码在两个 git 修订之间的破坏性 API 变更
#[derive(Parser, Debug, Default)]
#[command(name = "apidrift")]
#[command(version)]
#[command(about = "结构化 API 差异与使用影响分析 - 比较两个 git 修订，找出破坏性签名变更及受影响的调用点")]
pub struct Args {
    /// 对比的基准 git 引用（默认 origin/main）
    #[arg(long)]
    pub base_ref: Option<String>,

    /// 对比的目标 git 引用（默认 HEAD）
    #[arg(long)]
    pub head_ref: Option<String>,

    /// git 仓库路径（默认当前目录）
    #[arg(long)]
    pub repository_path: Option<PathBuf>,

    /// 忽略没有检测到任何使用的破坏性变更
    #[arg(long)]
    pub ignore_unused: bool,

    /// 参与分析的文件模式，逗号分隔（默认 **/*.py）
    #[arg(long, value_delimiter = ',')]
    pub include_patterns: Vec<String>,

    /// 排除的文件模式，逗号分隔
    #[arg(long, value_delimiter = ',')]
    pub exclude_patterns: Vec<String>,

    /// JSON 报告输出路径
    #[arg(long)]
    pub json_output: Option<PathBuf>,

    /// Markdown 报告输出路径
    #[arg(long)]
    pub markdown_output: Option<PathBuf>,

    /// TOML 配置文件路径（默认读取仓库下的 apidrift.toml）
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// 检测到破坏性变更时也以退出码 0 结束
    #[arg(long)]
    pub no_fail_on_breaking: bool,
}
