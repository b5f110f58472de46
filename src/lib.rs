pub mod context;
pub mod document;
pub mod features;
pub mod fetch;
pub mod gtfs;
pub mod infra;
pub mod localize;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod services;
pub mod stats;
