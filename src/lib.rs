pub mod config;
pub mod converter;
pub mod error;
pub mod fs_util;
pub mod gate;
pub mod identifier;
pub mod ledger;
pub mod matcher;
pub mod output;
pub mod pipeline;
pub mod rules;
pub mod store;
