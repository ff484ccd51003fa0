pub mod messages;
pub mod sessions;
