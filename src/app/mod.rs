pub mod bot;
pub mod local;
