//! Persistence: a key-value backend plus typed collections mirrored into it.

mod backend;
mod collection;
mod preferences;

pub use backend::{FileBackend, KvBackend, MemoryBackend};
#[cfg(test)]
pub(crate) use backend::FailingBackend;
pub use collection::{AppendReport, Collection, Patch};
pub use preferences::{load_dark_mode, save_dark_mode};
