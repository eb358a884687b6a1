pub mod app;
pub mod arxiv;
pub mod config;
pub mod domain;
pub mod error;
mod http;
pub mod openfda;
pub mod output;
pub mod prompts;
pub mod render;
pub mod store;
pub mod tools;
pub mod topic;
