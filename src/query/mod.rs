// Submodules for separation of concerns
mod builder;
mod cached;
mod cursor;
mod paginator;

// Public API re-exports
pub use builder::Query;
pub use cached::{CachedResultSet, CursorShape};
pub use cursor::Cursor;
pub use paginator::Paginator;
