use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};

/// 默认配置文件名
pub const CONFIG_FILE: &str = "cms.yml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 站点标题
    pub title: String,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    /// 站点完整地址，用于订阅源、站点地图和邮件中的链接
    pub url: String,
    /// 监听地址
    pub host: String,
    pub port: u16,
    /// SQLite 数据库文件
    pub database: PathBuf,
    /// 上传文件目录
    pub media_dir: PathBuf,
    /// 静态资源目录
    pub static_dir: PathBuf,
    /// 覆盖内置模板的目录
    pub theme_dir: Option<PathBuf>,
    /// 列表每页条数
    pub per_page: usize,
    /// 登录会话有效期（小时）
    pub session_ttl_hours: i64,
    /// 默认日志级别（RUST_LOG 优先）
    pub log_level: String,
    /// 部署在反向代理之后时，用 X-Forwarded-For 记录访客地址
    pub trust_forwarded_for: bool,
    pub mail: MailConfig,
}

/// 模板中可见的站点信息
#[derive(Debug, Clone, Serialize)]
pub struct SiteInfo {
    pub title: String,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub url: String,
}

/// 邮件发送方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MailBackend {
    /// 写入日志
    #[default]
    Console,
    /// 通过 SMTP 发送
    Smtp,
    /// 保存在内存中（测试用）
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub backend: MailBackend,
    pub from_email: String,
    /// 联系表单的收件人
    pub admins: Vec<String>,
    pub smtp: SmtpConfig,
}

/// SMTP 连接的加密方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// 明文连接，只适合本机或内网中继
    None,
    /// 先明文连接，再升级为 TLS
    StartTls,
    /// 直接建立 TLS 连接
    Tls,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// 未配置时：有登录凭据用 STARTTLS，否则明文
    pub tls: Option<SmtpSecurity>,
}

impl SmtpConfig {
    /// 实际使用的加密方式
    pub fn security(&self) -> SmtpSecurity {
        match self.tls {
            Some(security) => security,
            None if self.username.is_some() && self.password.is_some() => SmtpSecurity::StartTls,
            None => SmtpSecurity::None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: "My Site".to_string(),
            subtitle: None,
            description: None,
            url: "http://localhost:8000".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8000,
            database: PathBuf::from("cms.db"),
            media_dir: PathBuf::from("media"),
            static_dir: PathBuf::from("static"),
            theme_dir: None,
            per_page: 10,
            session_ttl_hours: 24 * 14,
            log_level: "info".to_string(),
            trust_forwarded_for: false,
            mail: MailConfig::default(),
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            backend: MailBackend::Console,
            from_email: "noreply@example.com".to_string(),
            admins: Vec::new(),
            smtp: SmtpConfig::default(),
        }
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 25,
            username: None,
            password: None,
            tls: None,
        }
    }
}

impl Config {
    /// 从文件加载配置
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件: {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("配置文件格式错误: {}", path.display()))?;
        Ok(config)
    }

    /// 加载配置，文件不存在时使用默认值
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// 保存配置到文件
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;
        Ok(())
    }

    /// 保存配置的别名
    pub fn save(&self, path: &Path) -> Result<()> {
        self.save_to_file(path)
    }

    /// 把相对路径解析到配置文件所在目录
    pub fn resolve_paths(mut self, base_dir: &Path) -> Self {
        let resolve = |p: &PathBuf| {
            if p.is_absolute() {
                p.clone()
            } else {
                base_dir.join(p)
            }
        };
        self.database = resolve(&self.database);
        self.media_dir = resolve(&self.media_dir);
        self.static_dir = resolve(&self.static_dir);
        self.theme_dir = self.theme_dir.as_ref().map(resolve);
        self
    }

    /// 拼接站点完整地址
    pub fn absolute_url(&self, path: &str) -> String {
        format!("{}{}", self.url.trim_end_matches('/'), path)
    }

    pub fn site_info(&self) -> SiteInfo {
        SiteInfo {
            title: self.title.clone(),
            subtitle: self.subtitle.clone(),
            description: self.description.clone(),
            url: self.url.trim_end_matches('/').to_string(),
        }
    }

    /// 联系表单收件人，未配置时发给发件地址
    pub fn contact_recipients(&self) -> Vec<String> {
        if self.mail.admins.is_empty() {
            vec![self.mail.from_email.clone()]
        } else {
            self.mail.admins.clone()
        }
    }
}
