pub mod download;
pub mod health;
pub mod metadata;
pub mod remove_background;
