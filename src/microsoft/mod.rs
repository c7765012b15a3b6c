pub mod graph;
pub mod oauth;

pub use graph::{GraphClient, UserProfile};
pub use oauth::Credentials;
