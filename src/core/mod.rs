pub mod config;
pub mod db;
pub mod error;

pub use config::{AppConfig, EmbedderKind};
pub use error::MailQaError;
