pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod likes;
pub mod matches;
pub mod messages;
pub mod model;
pub mod users;
