//! Crime severity prediction.
//!
//! An offline pipeline trains and selects a classifier on synthetic crime
//! reports; an axum service loads the saved bundle and scores new reports.

pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod ml;
pub mod models;

pub use error::{AppError, Result};
