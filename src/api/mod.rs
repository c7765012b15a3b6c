pub mod routes;
mod server;
pub use server::{app, serve};
pub mod public;
mod state;
pub use state::{AppState, MailSession, SharedState, forget_sign_in, session_access_token};
