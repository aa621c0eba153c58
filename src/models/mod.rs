pub mod health;
pub mod message;
pub mod notification;
pub mod preference;
pub mod retry;
pub mod settings;
