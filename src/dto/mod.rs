pub mod admin;
pub mod health;
pub mod save;
pub mod ws;
