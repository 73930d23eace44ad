//! examprep-providers — backends for the examprep collaborator traits.
//!
//! Implements `QuestionGenerator`, `AttemptStore`, and `MasteryTracker` over
//! the examprep REST API, plus a local JSON store for offline practice and a
//! scripted generator for tests.

pub mod api;
pub mod config;
pub mod error;
pub mod generator;
pub mod local;
pub mod mock;
pub mod store;

pub use api::ApiClient;
pub use config::{create_api_client, load_config, load_config_from, ApiConfig, ExamprepConfig};
pub use error::RemoteError;
pub use generator::HttpQuestionGenerator;
pub use local::LocalAttemptStore;
pub use mock::{MockGenerator, MockReply};
pub use store::HttpAttemptStore;
