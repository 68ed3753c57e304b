pub mod file_handlers;
pub mod gateway_handlers;
pub mod health_handlers;
