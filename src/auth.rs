//! 密码哈希、随机令牌和登录会话

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::{Rng, RngCore};
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{NewUser, User};
use crate::storage::{Store, StorageError};

/// 会话、订阅确认等令牌的长度
pub const TOKEN_LENGTH: usize = 64;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("用户名或密码错误")]
    InvalidCredentials,

    #[error("账号已停用")]
    Inactive,

    #[error("密码哈希失败: {0}")]
    Hash(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, AuthError>;

/// argon2id 哈希，随机盐
pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| AuthError::Hash(e.to_string()))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

/// 校验密码；哈希格式错误视为不匹配
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// 字母数字随机串
pub fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// 新建用户（明文密码在这里哈希）
pub fn create_user(store: &Store, input: &NewUser) -> Result<User> {
    let hash = hash_password(&input.password)?;
    let user = store.create_user(input, &hash)?;
    info!("创建用户: {}", user.username);
    Ok(user)
}

/// 校验用户名和密码
pub fn authenticate(store: &Store, username: &str, password: &str) -> Result<User> {
    let user = match store.get_user_by_username(username) {
        Ok(user) => user,
        Err(e) if e.is_not_found() => return Err(AuthError::InvalidCredentials),
        Err(e) => return Err(e.into()),
    };
    if !verify_password(password, &user.password_hash) {
        debug!("用户 {} 密码错误", username);
        return Err(AuthError::InvalidCredentials);
    }
    if !user.is_active {
        return Err(AuthError::Inactive);
    }
    Ok(user)
}

/// 登录：记录登录时间并创建会话，返回会话令牌
pub fn login(store: &Store, user: &User, ttl_hours: i64) -> Result<String> {
    let token = random_token(TOKEN_LENGTH);
    let expires_at = Utc::now() + Duration::hours(ttl_hours.max(1));
    store.create_session(&token, user.id, expires_at)?;
    store.touch_last_login(user.id)?;
    info!("用户登录: {}", user.username);
    Ok(token)
}

/// 修改密码，需要提供旧密码
pub fn change_password(store: &Store, user: &User, old_password: &str, new_password: &str) -> Result<()> {
    if !verify_password(old_password, &user.password_hash) {
        return Err(AuthError::InvalidCredentials);
    }
    let hash = hash_password(new_password)?;
    store.set_password(user.id, &hash)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_user(password: &str) -> (Store, User) {
        let store = Store::open_in_memory().unwrap();
        let user = create_user(
            &store,
            &NewUser {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                password: password.to_string(),
                ..NewUser::default()
            },
        )
        .unwrap();
        (store, user)
    }

    #[test]
    fn hash_and_verify() {
        let hash = hash_password("s3cret").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("s3cret", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("s3cret", "not-a-hash"));
    }

    #[test]
    fn tokens_are_alphanumeric() {
        let token = random_token(TOKEN_LENGTH);
        assert_eq!(token.len(), TOKEN_LENGTH);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(token, random_token(TOKEN_LENGTH));
    }

    #[test]
    fn login_creates_session() {
        let (store, user) = store_with_user("pw");
        assert!(matches!(
            authenticate(&store, "alice", "nope"),
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            authenticate(&store, "nobody", "pw"),
            Err(AuthError::InvalidCredentials)
        ));

        let user = authenticate(&store, "alice", "pw").unwrap();
        let token = login(&store, &user, 1).unwrap();
        let session_user = store.session_user(&token).unwrap().unwrap();
        assert_eq!(session_user.id, user.id);
        assert!(session_user.last_login.is_some());
    }

    #[test]
    fn change_password_requires_old_one() {
        let (store, user) = store_with_user("old");
        assert!(change_password(&store, &user, "bad", "new").is_err());
        change_password(&store, &user, "old", "new").unwrap();
        assert!(authenticate(&store, "alice", "new").is_ok());
    }
}
