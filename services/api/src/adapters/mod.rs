pub mod db;
pub mod http;
pub mod notifier;
pub mod ui_state;

pub use db::DbAdapter;
pub use http::ReqwestTransport;
pub use notifier::{BroadcastNotifier, LearnerNotice};
pub use ui_state::PushedUiState;
