pub mod api;
pub mod app_error;
pub mod app_state;
pub mod bootstrap;
pub mod config;
pub mod db;
pub mod middleware;
pub mod models;
pub mod money;
pub mod order_no;
pub mod repository;
pub mod routes;
pub mod schema;
pub mod services;
pub mod status;
pub mod swagger;

#[cfg(test)]
mod testing;
