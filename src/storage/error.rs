use rusqlite::ErrorCode;
use thiserror::Error;

/// 存储层错误
#[derive(Debug, Error)]
pub enum StorageError {
    /// 记录不存在
    #[error("{entity} 不存在: {id}")]
    NotFound { entity: String, id: String },

    /// 违反唯一约束（例如 slug 重复）
    #[error("{entity} 已存在: {message}")]
    Conflict { entity: String, message: String },

    /// 数据校验失败
    #[error("数据校验失败: {message}")]
    Validation { message: String },

    /// 无法打开或使用数据库连接
    #[error("数据库连接错误: {0}")]
    Connection(String),

    /// 建表失败
    #[error("数据库初始化失败 ({name}): {reason}")]
    Migration { name: String, reason: String },

    #[error("查询错误: {0}")]
    Query(rusqlite::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

impl StorageError {
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn conflict(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conflict {
            entity: entity.into(),
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, msg) if e.code == ErrorCode::ConstraintViolation => {
                let message = msg.clone().unwrap_or_else(|| e.to_string());
                // UNIQUE constraint failed: posts.slug
                let entity = message
                    .rsplit(": ")
                    .next()
                    .and_then(|cols| cols.split('.').next())
                    .unwrap_or("record")
                    .to_string();
                if message.contains("UNIQUE") {
                    Self::Conflict { entity, message }
                } else {
                    Self::Validation { message }
                }
            }
            rusqlite::Error::QueryReturnedNoRows => Self::NotFound {
                entity: "record".to_string(),
                id: String::new(),
            },
            _ => Self::Query(err),
        }
    }
}

/// 把“查询无结果”转换为指定实体的 NotFound
pub(crate) trait OptionalExt<T> {
    fn or_not_found(self, entity: &str, id: impl ToString) -> Result<T>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn or_not_found(self, entity: &str, id: impl ToString) -> Result<T> {
        match self {
            Ok(value) => Ok(value),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(StorageError::not_found(entity, id)),
            Err(e) => Err(e.into()),
        }
    }
}
