pub mod config;
pub mod events;
pub mod state;

pub use config::{CollectionDefaults, Config};
pub use events::{Action, AppEvent, poll_event};
pub use state::{AppState, Command, ViewMode};
