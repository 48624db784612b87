pub mod config;
pub mod division;
pub mod error;
pub mod feeds;
pub mod grades;
pub mod ledger;
pub mod nomination;
pub mod pipeline;
pub mod report;
pub mod rules;
pub mod store;
