pub mod dashboard;
pub mod discord;
pub mod state;

pub use state::AppState;
