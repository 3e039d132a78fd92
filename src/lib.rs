//! Data-access core for the logistics back office: filtered, paginated,
//! optionally-grouped queries over deliveries, third-party carriers and
//! trips, with an in-process time-boxed cache in front.

pub mod cache;
pub mod config;
pub mod db;
pub mod query;
pub mod services;
