pub mod config;
pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use config::Config;
pub use domain::entities;
pub use domain::value_objects;
