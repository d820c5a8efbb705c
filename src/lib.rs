//! codelift library crate
//!
//! Turns legacy HTML/CSS/JS into suggestions for a modern component project and
//! moves files to and from GitHub. The CLI in `main.rs` is a thin layer over these
//! modules.

pub mod config;
pub mod github;
pub mod history;
pub mod keyring;
pub mod logging;
pub mod project;
pub mod source;
pub mod suggest;
