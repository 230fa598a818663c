pub mod cli;
pub mod config;
pub mod crawl;
pub mod logging;
pub mod loris;
pub mod signals;
pub mod store;
pub mod utils;
