pub mod auth;
pub mod export;
pub mod store;
pub mod theme;

pub use auth::AuthService;
pub use export::export_profile;
pub use store::{AppSnapshot, AppStore, AppSubscription};
pub use theme::ThemeStore;
