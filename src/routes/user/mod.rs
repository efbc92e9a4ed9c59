mod handler;
mod model;

pub use handler::{get_profile, login, logout, register, update_nickname};
