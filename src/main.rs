use clap::Parser;

use apidrift::analysis::BreakingChangeDetector;
use apidrift::args::Args;
use apidrift::config::AppConfig;
use apidrift::report::ReportGenerator;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    std::process::exit(run(args).await);
}

async fn run(args: Args) -> i32 {
    let config = match AppConfig::load(&args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("配置错误: {}", e);
            return 2;
        }
    };

    let detector = BreakingChangeDetector::new(config.clone());
    let result = match detector.analyze().await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("分析过程中发生严重错误: {}", e);
            return 2;
        }
    };

    let reporter = ReportGenerator::new(config.clone());
    reporter.generate_console_report(&result);

    if let Some(path) = &config.json_output {
        if let Err(e) = reporter.generate_json_report(&result, path) {
            tracing::error!("JSON 报告生成失败: {}", e);
        }
    }
    if let Some(path) = &config.markdown_output {
        if let Err(e) = reporter.generate_markdown_report(&result, path) {
            tracing::error!("Markdown 报告生成失败: {}", e);
        }
    }

    if config.fail_on_breaking {
        result.exit_code
    } else {
        0
    }
}
