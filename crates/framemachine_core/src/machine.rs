//! Frame machine execution.
//!
//! A machine owns one code frame and two state frames. Every cycle reads the
//! active frame, writes the inactive one and then swaps them. Cells whose
//! compare test fails are not written, so they keep the value from two
//! cycles earlier.

use crate::error::ConstructionError;
use crate::genome::CodeFrameLogic;
use framemachine_data::{
    CmpType, CodeFrame, Instruction, NegSelect, OpSelect, StateFrame, FRAME_COUNT, FRAME_SIZE,
    INPUT_CELL, OUTPUT_CELL,
};
use rand::rngs::OsRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of a machine inside a population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MachineId(Uuid);

impl MachineId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_rng<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(Uuid::from_u128(rng.gen::<u128>()))
    }

    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MachineId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}", (self.0.as_u128() >> 96) as u32)
    }
}

#[derive(Debug, Clone)]
pub struct Machine {
    id: MachineId,
    code: CodeFrame,
    frames: [StateFrame; FRAME_COUNT],
    active: usize,
}

impl Machine {
    /// A machine with zeroed state running `code`.
    #[must_use]
    pub fn new(code: CodeFrame) -> Self {
        Self::with_id(MachineId::new(), code)
    }

    #[must_use]
    pub fn with_id(id: MachineId, code: CodeFrame) -> Self {
        Self {
            id,
            code,
            frames: [[0; FRAME_SIZE]; FRAME_COUNT],
            active: 0,
        }
    }

    /// Builds a machine from raw words; fails unless exactly one frame is given.
    pub fn from_words(words: &[u32]) -> Result<Self, ConstructionError> {
        Ok(Self::new(CodeFrame::from_words(words)?))
    }

    /// A machine with a random program drawn from the operating system's CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        Self::generate_with_rng(&mut OsRng)
    }

    pub fn generate_with_rng<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let id = MachineId::from_rng(rng);
        Self::with_id(id, CodeFrame::random_with_rng(rng))
    }

    #[must_use]
    pub fn id(&self) -> MachineId {
        self.id
    }

    #[must_use]
    pub fn code(&self) -> &CodeFrame {
        &self.code
    }

    #[must_use]
    pub fn input(&self) -> i32 {
        self.active_frame()[INPUT_CELL]
    }

    pub fn set_input(&mut self, value: i32) {
        self.frames[self.active][INPUT_CELL] = value;
    }

    #[must_use]
    pub fn output(&self) -> i32 {
        self.active_frame()[OUTPUT_CELL]
    }

    #[must_use]
    pub fn active_index(&self) -> usize {
        self.active
    }

    #[must_use]
    pub fn active_frame(&self) -> &StateFrame {
        &self.frames[self.active]
    }

    /// The frame the next cycle writes into.
    #[must_use]
    pub fn inactive_frame(&self) -> &StateFrame {
        &self.frames[(self.active + 1) % FRAME_COUNT]
    }

    /// Overwrites one register of the active frame.
    pub fn set_register(&mut self, cell: usize, value: i32) {
        self.frames[self.active][cell] = value;
    }

    /// Advances the machine by one step.
    pub fn cycle(&mut self) {
        let input = self.input();
        let (current, next) = split_frames(&mut self.frames, self.active);
        for (slot, &word) in next.iter_mut().zip(self.code.words().iter()) {
            if let Some(value) = execute(Instruction::decode(word), current, input) {
                *slot = value;
            }
        }
        self.active = (self.active + 1) % FRAME_COUNT;
    }
}

impl fmt::Display for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.id.fmt(f)
    }
}

fn split_frames(
    frames: &mut [StateFrame; FRAME_COUNT],
    active: usize,
) -> (&StateFrame, &mut StateFrame) {
    let (first, second) = frames.split_at_mut(1);
    if active == 0 {
        (&first[0], &mut second[0])
    } else {
        (&second[0], &mut first[0])
    }
}

/// Whether `cmp` lets the cell be written for the given compare value.
#[must_use]
pub fn passes(cmp: CmpType, testval: i32) -> bool {
    match cmp {
        CmpType::Zero => testval == 0,
        CmpType::NotZero => testval != 0,
        CmpType::Negative => testval < 0,
        CmpType::Positive => testval > 0,
    }
}

/// Value written for one cell, or `None` when the cell is skipped.
fn execute(inst: Instruction, current: &StateFrame, input: i32) -> Option<i32> {
    let testval = current[usize::from(inst.cmp_addr)];
    if !passes(inst.cmp_type, testval) {
        return None;
    }
    let op: fn(i32, i32) -> i32 = match inst.op_select {
        OpSelect::Input => return Some(input),
        OpSelect::Or => |x, y| x | y,
        OpSelect::And => |x, y| x & y,
        OpSelect::Xor => |x, y| x ^ y,
    };
    Some(apply(
        op,
        inst.neg_select,
        current[usize::from(inst.arg0_addr)],
        current[usize::from(inst.arg1_addr)],
    ))
}

fn apply(op: fn(i32, i32) -> i32, neg: NegSelect, mut arg0: i32, mut arg1: i32) -> i32 {
    if neg.contains(NegSelect::ARG0) {
        arg0 = !arg0;
    }
    if neg.contains(NegSelect::ARG1) {
        arg1 = !arg1;
    }
    let result = op(arg0, arg1);
    if neg.contains(NegSelect::RESULT) {
        !result
    } else {
        result
    }
}
