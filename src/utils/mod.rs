//! Internal utility helpers for JSON export files.

pub(crate) mod download;
