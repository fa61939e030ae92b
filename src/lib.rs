pub mod app;
pub mod audio;
pub mod config;
pub mod core;
pub mod model;
pub mod playlist;
pub mod search;
pub mod ui;
