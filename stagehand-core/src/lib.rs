//! Stagehand Core
//!
//! Core types shared by every Stagehand component.
//!
//! This crate contains:
//! - Domain types: stages, steps and their persisted status
//! - DTOs: wire types exchanged with the status API
//! - Container labels attached to executed steps
//! - Pipeline identity hashing used to name log artifacts

pub mod domain;
pub mod dto;
pub mod labels;
pub mod pipeline_id;
