//! Helpers for connecting to a rabbitmq broker

pub mod configuration;
mod factory;
pub mod transport;
pub use factory::ConnectionFactory;
