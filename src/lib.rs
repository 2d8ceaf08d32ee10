//! Fair-share GPS packet scheduler for a multi-user media jukebox.

pub mod config;
pub mod database;
pub mod errors;
pub mod models;
pub mod player;
pub mod remote;
pub mod repositories;
pub mod scheduler;
pub mod web;

pub use errors::AppError;
pub use scheduler::Scheduler;
