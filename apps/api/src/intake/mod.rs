pub mod extract;
pub mod form_config;
pub mod handlers;
pub mod models;
pub mod storage;
pub mod validation;
