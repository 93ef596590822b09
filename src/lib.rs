pub mod adapters;
pub mod config;
pub mod driver;
pub mod fs;
pub mod model;
pub mod util;
