pub mod analytics;
pub mod conduit;
pub mod core;
pub mod events;
pub mod groups;
pub mod lessons;
pub mod olympiads;
pub mod students;
