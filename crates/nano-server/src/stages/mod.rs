//! Built-in request stages.

pub mod api_key;
pub mod logging;
pub mod recovery;

pub use api_key::ApiKeyStage;
pub use logging::LoggingStage;
pub use recovery::RecoveryStage;
