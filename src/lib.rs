pub mod app;
pub mod discord;
pub mod identity;
pub mod models;
pub mod rate_limit;
pub mod validation;
