//! # FrameMachine Data
//!
//! Plain data shared by every FrameMachine crate: the frame geometry, the
//! packed instruction format and the code frame that holds a machine's
//! program. Execution lives in `framemachine_core`.

pub mod data;

pub use data::code_frame::{CodeFrame, FrameLengthError};
pub use data::instruction::{CmpType, Instruction, NegSelect, OpSelect};

/// Number of state frames a machine ping-pongs between.
pub const FRAME_COUNT: usize = 2;
/// Cells per code frame and per state frame.
pub const FRAME_SIZE: usize = 0x100;
/// State cell the machine input is mapped to.
pub const INPUT_CELL: usize = 0x00;
/// State cell the machine output is read from.
pub const OUTPUT_CELL: usize = FRAME_SIZE - 1;

/// One frame of registers.
pub type StateFrame = [i32; FRAME_SIZE];
