//! Storage layer for the door controller.
//!
//! This crate holds the in-memory tables the controller consults on every
//! presentation and the persistence seam they are saved through:
//!
//! - [`AccessTable`] - authorized users, first-match lookup by tag
//! - [`RuleTable`] - ordered, index-addressed trigger/action rules
//! - [`SettingsDocument`] - the complete persisted configuration
//! - [`SettingsStore`] - load/save/clear, with [`JsonFileStore`] and
//!   [`MemoryStore`] implementations
//!
//! # Examples
//!
//! ```
//! use doorman_core::AuthorizedUser;
//! use doorman_storage::{MemoryStore, SettingsStore, load_or_default};
//!
//! let mut store = MemoryStore::new();
//! let mut document = load_or_default(&store);
//! document.access.push(AuthorizedUser::new("alice", "12345"));
//! store.save(&document).unwrap();
//!
//! assert_eq!(load_or_default(&store).access.len(), 1);
//! ```

pub mod access;
pub mod error;
pub mod rules;
pub mod settings;
pub mod store;

pub use access::AccessTable;
pub use error::{StorageError, StorageResult};
pub use rules::RuleTable;
pub use settings::{DeviceSettings, SettingsDocument, SettingsPatch};
pub use store::{JsonFileStore, MemoryStore, SettingsStore, load_or_default};
