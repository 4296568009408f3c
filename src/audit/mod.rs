pub mod client;
pub mod middleware;
pub mod repo;
