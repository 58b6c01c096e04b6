//! # athena-settings
//!
//! Layered configuration for the Athena device gateway.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`GatewaySettings::default()`]
//! 2. **User file**: `~/.athena/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `ATHENA_*` overrides (highest priority)
//!
//! Command-line flags are applied on top by the binary.
//!
//! # Usage
//!
//! ```no_run
//! use athena_settings::{load_settings_from_path, settings_path};
//!
//! let settings = load_settings_from_path(&settings_path()).unwrap_or_default();
//! println!("listening on port {}", settings.server.port);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings_from_path, settings_path};
pub use types::*;
