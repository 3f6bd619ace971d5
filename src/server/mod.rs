mod app;
mod middleware;
mod state;

pub use app::create_app;
pub use middleware::{api_key_auth, API_KEY_HEADER};
pub use state::{build_dispatcher, AppState};
