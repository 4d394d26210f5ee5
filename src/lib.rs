//! Chat Supervisor - lifecycle management for line-oriented chatbot processes.

pub mod cli;
pub mod config;
pub mod display;
pub mod supervisor;
