pub mod cli;
pub mod config;
pub mod controller;
pub mod entity;
pub mod error;
pub mod logging;
pub mod storage;
pub mod transfer;
pub mod view;
pub mod warnings;
pub mod workspace;

pub use controller::Controller;
pub use error::{Result, TrackbookError};
pub use workspace::{AppKind, Workspace};
