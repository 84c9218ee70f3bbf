#![allow(unused_imports)]

pub use super::bookmark_cache::Entity as BookmarkCache;
