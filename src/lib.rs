pub mod assistant;
pub mod config;
pub mod engine;
pub mod limits;
pub mod model;
pub mod observability;
pub mod selection;
pub mod session;
pub mod store;
