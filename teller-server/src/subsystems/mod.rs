pub mod lifecycle;
pub mod messages;
pub mod registry;
pub mod sessions;
pub mod sweeper;
