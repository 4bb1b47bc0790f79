use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use crate::auth;
use crate::core::{import_directory, Engine, Server};
use crate::models::config::{Config, CONFIG_FILE};
use crate::models::NewUser;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// 配置文件路径
    #[arg(short, long, default_value = CONFIG_FILE)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 生成配置文件并初始化数据库
    Init(InitArgs),

    /// 启动网站服务器
    Serve(ServeArgs),

    /// 创建用户
    CreateUser(CreateUserArgs),

    /// 从 Markdown 目录导入文章
    Import(ImportArgs),

    /// 发送到期的计划期刊
    SendNewsletters,
}

#[derive(Args)]
pub struct InitArgs {
    /// 站点标题
    #[arg(short, long)]
    pub title: Option<String>,

    /// 覆盖已有的配置文件
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct ServeArgs {
    /// 端口号
    #[arg(short, long)]
    pub port: Option<u16>,

    /// 监听地址
    #[arg(long)]
    pub host: Option<String>,
}

#[derive(Args)]
pub struct CreateUserArgs {
    pub username: String,

    pub email: String,

    /// 登录密码
    #[arg(short, long)]
    pub password: String,

    /// 可以访问管理接口
    #[arg(long)]
    pub staff: bool,

    /// 超级管理员（同时是员工）
    #[arg(long)]
    pub superuser: bool,
}

#[derive(Args)]
pub struct ImportArgs {
    /// Markdown 文件所在目录
    pub dir: PathBuf,

    /// 文章作者的用户名
    #[arg(short, long)]
    pub author: String,

    /// 直接发布（front matter 中 draft: true 的除外）
    #[arg(long)]
    pub publish: bool,
}

/// 配置文件所在目录，用来解析相对路径
fn config_base(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// 读取配置，相对路径按配置文件所在目录解析
pub fn load_config(path: &Path) -> Result<Config> {
    Ok(Config::load(path)?.resolve_paths(&config_base(path)))
}

/// 写入默认配置
fn init_config(path: &Path, args: &InitArgs) -> Result<Config> {
    if path.exists() && !args.force {
        info!("配置文件已存在: {}", path.display());
        return Config::load(path);
    }
    let mut config = Config::default();
    if let Some(title) = &args.title {
        config.title = title.clone();
    }
    config
        .save(path)
        .with_context(|| format!("无法写入配置文件: {}", path.display()))?;
    info!("已生成配置文件: {}", path.display());
    Ok(config)
}

/// 执行命令
pub async fn execute(cli: Cli) -> Result<()> {
    let config = match &cli.command {
        Commands::Init(args) => init_config(&cli.config, args)?.resolve_paths(&config_base(&cli.config)),
        _ => load_config(&cli.config)?,
    };

    match cli.command {
        Commands::Init(_) => {
            let engine = Engine::new(config)?;
            engine.ensure_dirs()?;
            info!("数据库已初始化: {}", engine.config.database.display());
            println!(
                "{} {}",
                "下一步:".bright_green(),
                "rust-cms create-user <username> <email> --password <password> --staff"
            );
        }
        Commands::Serve(args) => {
            let host = args.host.unwrap_or_else(|| config.host.clone());
            let port = args.port.unwrap_or(config.port);
            let engine = Arc::new(Engine::new(config)?);
            Server::new(engine).with_addr(&host, port).start().await?;
        }
        Commands::CreateUser(args) => {
            if args.password.len() < 8 {
                bail!("密码至少需要 8 个字符");
            }
            let engine = Engine::new(config)?;
            let user = auth::create_user(
                &engine.store,
                &NewUser {
                    username: args.username,
                    email: args.email,
                    password: args.password,
                    is_staff: args.staff || args.superuser,
                    is_superuser: args.superuser,
                    ..NewUser::default()
                },
            )?;
            println!("{} {} (id {})", "已创建用户".bright_green(), user.username, user.id);
        }
        Commands::Import(args) => {
            let engine = Engine::new(config)?;
            let author = engine
                .store
                .get_user_by_username(&args.author)
                .with_context(|| format!("找不到用户: {}", args.author))?;
            let report = import_directory(&engine.store, &args.dir, author.id, args.publish)?;
            println!(
                "{} {} 篇, 跳过 {} 篇",
                "已导入".bright_green(),
                report.imported,
                report.skipped
            );
        }
        Commands::SendNewsletters => {
            let engine = Engine::new(config)?;
            let sent = engine.send_due_newsletters().await?;
            println!("{} {} 期", "已发送".bright_green(), sent);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from(["rust-cms", "serve", "--port", "9000"]).unwrap();
        assert_eq!(cli.config, PathBuf::from(CONFIG_FILE));
        match cli.command {
            Commands::Serve(args) => {
                assert_eq!(args.port, Some(9000));
                assert!(args.host.is_none());
            }
            _ => panic!("expected serve"),
        }

        let cli = Cli::try_parse_from([
            "rust-cms", "-c", "site/cms.yml", "create-user", "admin", "admin@example.com", "-p", "secret123",
            "--superuser",
        ])
        .unwrap();
        match cli.command {
            Commands::CreateUser(args) => {
                assert_eq!(args.username, "admin");
                assert!(args.superuser);
                assert!(!args.staff);
            }
            _ => panic!("expected create-user"),
        }
    }

    #[test]
    fn relative_paths_follow_config_file() {
        assert_eq!(config_base(Path::new("cms.yml")), PathBuf::from("."));
        assert_eq!(config_base(Path::new("site/cms.yml")), PathBuf::from("site"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let args = InitArgs {
            title: Some("Demo".to_string()),
            force: false,
        };
        init_config(&path, &args).unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.title, "Demo");
        assert_eq!(config.database, dir.path().join("cms.db"));
    }

    #[tokio::test]
    async fn init_then_create_user_and_import() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE);
        let config_arg = config_path.to_str().unwrap();

        let cli = Cli::try_parse_from(["rust-cms", "-c", config_arg, "init", "--title", "Demo"]).unwrap();
        execute(cli).await.unwrap();
        assert!(dir.path().join("cms.db").exists());

        let cli = Cli::try_parse_from([
            "rust-cms", "-c", config_arg, "create-user", "alice", "alice@example.com", "-p", "password123",
        ])
        .unwrap();
        execute(cli).await.unwrap();

        let posts = dir.path().join("posts");
        std::fs::create_dir_all(&posts).unwrap();
        std::fs::write(posts.join("hello.md"), "---\ntitle: Hello\n---\nBody").unwrap();
        let cli = Cli::try_parse_from([
            "rust-cms", "-c", config_arg, "import", posts.to_str().unwrap(), "--author", "alice", "--publish",
        ])
        .unwrap();
        execute(cli).await.unwrap();

        let engine = Engine::new(load_config(&config_path).unwrap()).unwrap();
        let post = engine.store.get_published_post("hello").unwrap();
        assert_eq!(post.title, "Hello");
    }

    #[tokio::test]
    async fn short_password_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE);
        let cli = Cli::try_parse_from([
            "rust-cms", "-c", config_path.to_str().unwrap(), "create-user", "bob", "bob@example.com", "-p", "short",
        ])
        .unwrap();
        assert!(execute(cli).await.is_err());
    }
}
