//! Core data structures for FrameMachine programs.

pub mod code_frame;
pub mod instruction;
