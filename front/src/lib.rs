//! Client-side state for the Tidy todo list.
//!
//! [`Store`] owns the collection and applies mutations locally first; the
//! [`view`] and [`stats`] modules derive everything the UI shows from a
//! [`Snapshot`]. Mirroring to the server is best effort and runs in the
//! background through [`Syncer`].

pub mod achievements;
pub mod api;
pub mod config;
pub mod stats;
pub mod storage;
pub mod store;
pub mod sync;
pub mod transfer;
pub mod view;

pub use achievements::{Achievement, AchievementLedger};
pub use api::ApiClient;
pub use config::Config;
pub use stats::{DueStatus, Stats};
pub use storage::{FileStorage, MemoryStorage, Persistence, Storage, StorageError};
pub use store::{Counts, Snapshot, Store, StoreError};
pub use sync::Syncer;
pub use tidy_api::v1::{Category, Priority, Todo, TodoId, TodoPatch};
pub use transfer::TransferError;
pub use view::{Filters, ProjectionCache, SortMode, StatusFilter, ViewQuery};
