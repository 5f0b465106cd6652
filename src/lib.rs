//! coursebook: retrieval-augmented question answering over course content.
//!
//! Course text is split into overlapping word windows, embedded, and stored
//! in a vector index. Questions are embedded the same way, matched against
//! the index, and answered by a completion model from the best passages.
//! Every question is kept as a [`meta::QueryRecord`] that can later receive
//! a feedback score.

pub mod catalog;
pub mod chunk;
pub mod commands;
pub mod complete;
pub mod config;
pub mod embed;
pub mod error;
pub mod meta;
pub mod pipeline;
pub mod progress;
pub mod store;

#[cfg(test)]
mod testing;
