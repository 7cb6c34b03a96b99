//! Photo colorization: a neural pipeline, an upload record store with
//! time-based expiry, a web service and a desktop front end.

pub mod color;
pub mod config;
pub mod pipeline;
pub mod state;
pub mod web;
