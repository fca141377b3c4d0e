#![forbid(unsafe_code)]

pub mod cache;
pub mod chunker;
pub mod classify;
pub mod cli;
pub mod commands;
pub mod config;
pub mod generate;
pub mod groq;
pub mod html;
pub mod loader;
pub mod logging;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod prompt;
