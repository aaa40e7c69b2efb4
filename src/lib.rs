pub mod api;
pub mod broker;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod fare;
pub mod gateway;
pub mod geo;
pub mod models;
pub mod observability;
pub mod registry;
pub mod repository;
pub mod routing;
pub mod service;
pub mod state;
