//! Application services layer.

pub mod catalog;
pub mod content;
pub mod context;
pub mod error;
pub mod rating;
pub mod repos;
