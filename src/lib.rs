#[macro_use]
extern crate tracing;

pub mod config;
pub mod file_sd;
pub mod serf;
pub mod signal;
pub mod trace;
