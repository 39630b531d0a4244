pub mod config;
pub mod crawler;
pub mod error;
pub mod indexing;
pub mod lemmatizer;
pub mod models;
pub mod search;
pub mod store;
pub mod text;
