pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryIndex;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteIndex;
