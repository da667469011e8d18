#![doc = "flatgist-core: core logic library for flatgist."]

//! This crate holds everything that does not touch the network or the terminal:
//! walking a source tree into flat, uniquely named files, escaping their content
//! for a gist payload, and orchestrating a publish through a [`contract::Publisher`].
//!
//! # Usage
//! Build a [`config::FlattenConfig`], call [`flatten::flatten`] to stage files, or
//! [`pipeline::flatten_and_publish`] to stage and publish in one step.

pub mod config;
pub mod contract;
pub mod error;
pub mod flatten;
pub mod pipeline;
pub mod sanitize;

pub use config::{CollisionPolicy, FlattenConfig, UndecodablePolicy};
pub use contract::{GistFile, GistFiles, GistPayload, PublishOutcome, Publisher};
pub use error::FlattenError;
pub use flatten::{flatten, FlattenOutput};
pub use sanitize::{json_safe, json_safe_value};
