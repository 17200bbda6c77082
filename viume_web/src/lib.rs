mod page;
mod routes;
mod scanner;
mod server;
mod telemetry;
mod views;

pub mod app;
pub mod config;

pub use app::start_app;
