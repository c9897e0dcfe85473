//! Card shelf core: filtering, grouping, manual ordering, the reorder
//! gesture, import, backup and the library state that ties them together.

pub mod archive;
pub mod backup;
pub mod config;
pub mod error;
pub mod filter;
pub mod grouping;
pub mod import;
pub mod library;
pub mod order_writer;
pub mod ordering;
pub mod reorder;

pub use error::{ArchiveError, BackupError, LibraryError, RenderError};
pub use library::Library;
