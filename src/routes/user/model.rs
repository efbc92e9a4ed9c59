use serde::{Deserialize, Serialize};

use crate::services::RegisterCommand;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub user_name: String,
    pub password: String,
    pub age: i32,
    pub gender: String,
    #[serde(default)]
    pub nick_name: String,
}

impl From<RegisterRequest> for RegisterCommand {
    fn from(req: RegisterRequest) -> Self {
        RegisterCommand {
            user_name: req.user_name,
            password: req.password,
            age: req.age,
            gender: req.gender,
            nick_name: req.nick_name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub user_name: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ProfileQuery {
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateNicknameRequest {
    pub user_name: String,
    pub new_nick_name: String,
}

#[derive(Debug, Serialize)]
pub struct EmptyResponse {}
