//! Asynchronous object detection service
//!
//! Clients upload images over HTTP; each image becomes a job in a Redis-backed
//! queue. Separate worker processes run detection with bounded retry and
//! write a terminal result that clients poll for.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;
