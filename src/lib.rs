pub mod cli;
pub mod coalesce;
pub mod config;
pub mod event;
pub mod ingress;
pub mod rotate;
pub mod store;
pub mod upload;
