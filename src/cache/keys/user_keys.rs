/// 用户信息缓存键前缀（按用户名）
const USER_INFO_PREFIX: &str = "userinfo_";

/// 会话缓存键前缀（按会话标识）
const SESSION_PREFIX: &str = "session_";

/// 生成用户信息缓存键
pub fn user_info_key(user_name: &str) -> String {
    format!("{}{}", USER_INFO_PREFIX, user_name)
}

/// 生成会话缓存键
pub fn session_key(session: &str) -> String {
    format!("{}{}", SESSION_PREFIX, session)
}
