pub mod models;
pub mod summary;

pub use models::*;
pub use summary::*;
