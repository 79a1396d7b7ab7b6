// Library exports for galleria
// This allows integration tests and the CLI to share the same modules

pub mod collections;
pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod gateway;
pub mod images;
pub mod profiles;
pub mod session;
pub mod social;
pub mod state;
pub mod uploads;
pub mod viewer;
