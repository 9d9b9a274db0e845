//! Core engine of the Alfred mock server: helper expressions, the mock
//! model and loader, the script host, the embedded key-value store,
//! actions and the outbound client.

pub mod action;
pub mod config;
pub mod duration;
pub mod error;
pub mod exchange;
pub mod files;
pub mod helper;
pub mod kv;
pub mod mock;
pub mod outbound;
pub mod script;

pub use config::{apply_env_overrides, load_config, load_config_with_fallback, Config};
pub use error::{Error, Result};
pub use exchange::{Req, Res};
pub use helper::{build_helpers, replace_helpers, Helper, HelperKind};
pub use mock::{
    build_mock_from_json, create_mock_collection_from_folder, patch_mock, Mock, MockAction,
    MockRegistry,
};
pub use outbound::{OutboundRequest, OutboundResponse};
pub use script::{
    create_script_collection_from_folder, Script, ScriptCollection, ScriptVm, VmPool,
    VmPoolConfig,
};
