//! Backend access and local persistence for the assistant.

pub mod ai_store;
pub mod ai_sync;
pub mod api_client;
pub mod kv_store;
pub mod notify;
pub mod preferences;
pub mod refresh;
pub mod session;
pub mod token_store;

pub use ai_store::AiConfigStore;
pub use ai_sync::AiConfigApi;
pub use api_client::{ApiClient, Channel, Method, ReqwestTransport, Transport};
pub use kv_store::{FileStore, KeyValueStore, MemoryStore};
pub use notify::{LogNotifier, Notifier};
pub use preferences::{Preferences, ThemeMode};
pub use refresh::RefreshCoordinator;
pub use session::SessionApi;
pub use token_store::TokenStore;
