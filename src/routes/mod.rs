mod auth;
mod health_check;
mod tasks;

pub use auth::{current_user, login, logout, refresh, register};
pub use health_check::health_check;
pub use tasks::{create_task, delete_task, list_tasks, update_task};
