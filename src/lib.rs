//! Backend for a 4-Pics-1-Word puzzle generator
//!
//! Asks a text model for a secret word, four image hints and a fact, renders
//! each hint with an image model, and serves the result over HTTP.

pub mod ai;
pub mod app;
pub mod error;
pub mod fanout;
pub mod image;
pub mod models;
pub mod prompts;
pub mod server;

pub use error::{Error, Result};
