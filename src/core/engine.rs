use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::mail::{mailer_from_config, Mailer};
use crate::models::config::Config;
use crate::storage::Store;
use crate::theme::renderer::ThemeRenderer;

/// 站点引擎：配置、存储、模板和邮件后端。Web 层和命令行共享同一个实例
pub struct Engine {
    /// 站点配置
    pub config: Config,
    /// 数据存储
    pub store: Store,
    /// 主题渲染器
    pub renderer: ThemeRenderer,
    /// 邮件后端
    pub mailer: Arc<dyn Mailer>,
}

impl Engine {
    /// 按配置打开数据库并加载模板
    pub fn new(config: Config) -> Result<Self> {
        info!("初始化 CMS 引擎...");
        if let Some(parent) = config.database.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("无法创建数据库目录: {}", parent.display()))?;
        }
        let store = Store::open(&config.database)?;
        let mailer = mailer_from_config(&config.mail)?;
        Self::with_parts(config, store, mailer)
    }

    /// 用现成的存储和邮件后端组装引擎
    pub fn with_parts(config: Config, store: Store, mailer: Arc<dyn Mailer>) -> Result<Self> {
        store.seed_defaults()?;
        let renderer = ThemeRenderer::new(config.theme_dir.as_deref())?;
        info!("站点: {}", config.title);
        Ok(Self {
            config,
            store,
            renderer,
            mailer,
        })
    }

    /// 上传文件的保存目录
    pub fn media_dir(&self) -> &Path {
        &self.config.media_dir
    }

    /// 确保媒体和静态资源目录存在
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.config.media_dir, &self.config.static_dir] {
            fs::create_dir_all(dir).with_context(|| format!("无法创建目录: {}", dir.display()))?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("title", &self.config.title)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::mail::MemoryMailer;

    /// 内存数据库和内存邮件后端
    pub fn engine() -> (Engine, Arc<MemoryMailer>) {
        let mailer = Arc::new(MemoryMailer::new());
        let config = Config {
            url: "http://cms.test".to_string(),
            ..Config::default()
        };
        let engine = Engine::with_parts(config, Store::open_in_memory().unwrap(), mailer.clone()).unwrap();
        (engine, mailer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            database: dir.path().join("data/cms.db"),
            media_dir: dir.path().join("media"),
            static_dir: dir.path().join("static"),
            ..Config::default()
        };
        let engine = Engine::new(config).unwrap();
        engine.ensure_dirs().unwrap();
        assert!(dir.path().join("data/cms.db").exists());
        assert!(dir.path().join("media").is_dir());
        assert_eq!(engine.store.list_widget_areas().unwrap().len(), 2);
    }
}
