pub mod bookmark;
pub mod identity;
pub mod reputation;
