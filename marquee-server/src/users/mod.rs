pub mod admin_handlers;
pub mod auth;
pub mod source_handlers;
pub mod user_handlers;
