//! 偏好记忆层：本地 JSON 文件（权威）+ 远端长期记忆（尽力而为），以及会话消息

pub mod conversation;
pub mod extractor;
pub mod local_store;
pub mod memory_bank;
pub mod preference;
pub mod remote;
pub mod store;

pub use conversation::{Message, Role, Transcript};
pub use extractor::{FactExtractor, AUTO_KEY_PREFIX, FACT_QUERY};
pub use local_store::{LocalStore, DEFAULT_PREFERENCES_PATH};
pub use memory_bank::{MemoryBankClient, MemoryBankSettings};
pub use preference::{Preference, PreferenceSet, SourceAttribution};
pub use remote::{InMemoryRemoteMemory, MemoryError, RemoteFact, RemoteMemory};
pub use store::{PreferenceStore, RemoteWrite, StoreState, SyncReport, DEFAULT_SYNC_TIMEOUT};
