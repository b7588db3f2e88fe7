//! Filesystem host: the store, query index and notifier the CLI injects
//! into the sync pipeline.

pub mod fs_store;
pub mod notifier;
pub mod vault_index;

pub use fs_store::FsStore;
pub use notifier::ConsoleNotifier;
pub use vault_index::VaultIndex;
