pub mod api;
pub mod broadcast;
pub mod cli;
pub mod detector;
pub mod error;
pub mod limiter;
pub mod messages;
pub mod poll;
pub mod service;
pub mod settings;
