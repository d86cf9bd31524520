pub mod api;
pub mod auth;
pub mod config;
pub mod extraction;
pub mod nl;
pub mod persistence;
pub mod plagiarism;
pub mod similarity;
pub mod store;
pub mod structures;
