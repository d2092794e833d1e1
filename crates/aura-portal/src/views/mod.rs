//! # View State
//!
//! Records read from the backend collaborator and handed to frontends.

pub mod profile;
