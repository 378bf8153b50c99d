pub mod config;
pub mod crawler;
pub mod error;
pub mod indexing;
pub mod models;
pub mod morphology;
pub mod search;
pub mod statistics;
pub mod storage;
pub mod utils;

pub use error::{Result, SearchError};
