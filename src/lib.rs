// src/lib.rs

//! Classified-ad tracker library.
//!
//! Users register searches through a chat wizard; a poller fetches the
//! matching listing pages, extracts ads, detects ones not seen before and
//! notifies the owner.

pub mod bot;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;
