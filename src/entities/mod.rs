pub mod bookmark_cache;
pub mod prelude;
