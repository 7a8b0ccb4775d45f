//! Crate-level tests: pipeline scenarios over scripted collaborators and
//! end-to-end runs through FFmpeg.

pub mod e2e;
