use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use tracing::error;
use tracing_subscriber::{fmt, EnvFilter};

use rust_cms::cli::{self, load_config, Cli};

/// RUST_LOG 优先，其次是配置文件中的 log_level
fn init_logging(cli: &Cli) {
    let default_level = load_config(&cli.config)
        .map(|config| config.log_level)
        .unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt().with_target(false).with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let cli = Cli::parse();

    // 初始化日志系统
    init_logging(&cli);

    // 打印欢迎信息
    println!("{}", "
 ____           _      ____ __  __ ____
|  _ \\ _   _ __| |_   / ___|  \\/  / ___|
| |_) | | | / _` __| | |   | |\\/| \\___ \\
|  _ <| |_| \\__ \\ |_  | |___| |  | |___) |
|_| \\_\\\\__,_|___/\\__|  \\____|_|  |_|____/
    ".bright_cyan());

    println!("{} {}", "Rust CMS".bright_cyan(), env!("CARGO_PKG_VERSION").bright_green());
    println!("{}", "Pages, blog, comments and newsletters in one binary".bright_white());
    println!();

    // 执行命令
    if let Err(e) = cli::execute(cli).await {
        error!("Error: {}", e);

        // 打印错误链
        let mut source = e.source();
        while let Some(e) = source {
            error!("Caused by: {}", e);
            source = e.source();
        }

        std::process::exit(1);
    }

    Ok(())
}
