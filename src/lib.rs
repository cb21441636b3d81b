pub mod api_connection;
pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod food;
pub mod index_builder;
pub mod reasoning;
pub mod recommendation_filter;
pub mod search;

#[cfg(test)]
mod test_support;
