use crate::data::instruction::Instruction;
use crate::FRAME_SIZE;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A word sequence that is not exactly one frame long.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("code frame must hold exactly {expected} words, got {actual}")]
pub struct FrameLengthError {
    pub expected: usize,
    pub actual: usize,
}

/// A machine program: one packed instruction word per cell.
///
/// Serialized as a plain sequence of exactly [`FRAME_SIZE`] words.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<u32>", into = "Vec<u32>")]
pub struct CodeFrame {
    words: [u32; FRAME_SIZE],
}

impl CodeFrame {
    /// Copies a frame out of a slice, which must be exactly one frame long.
    pub fn from_words(words: &[u32]) -> Result<Self, FrameLengthError> {
        let words: [u32; FRAME_SIZE] = words.try_into().map_err(|_| FrameLengthError {
            expected: FRAME_SIZE,
            actual: words.len(),
        })?;
        Ok(Self { words })
    }

    /// Builds a frame by calling `f` for every cell index.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: FnMut(usize) -> u32,
    {
        Self {
            words: std::array::from_fn(f),
        }
    }

    /// A frame running the same instruction in every cell.
    #[must_use]
    pub fn filled(instruction: Instruction) -> Self {
        Self {
            words: [instruction.encode(); FRAME_SIZE],
        }
    }

    #[must_use]
    pub fn words(&self) -> &[u32; FRAME_SIZE] {
        &self.words
    }

    #[must_use]
    pub fn word(&self, cell: usize) -> u32 {
        self.words[cell]
    }

    /// Decodes the instruction at `cell`.
    #[must_use]
    pub fn instruction(&self, cell: usize) -> Instruction {
        Instruction::decode(self.words[cell])
    }

    pub fn instructions(&self) -> impl Iterator<Item = Instruction> + '_ {
        self.words.iter().map(|&w| Instruction::decode(w))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        FRAME_SIZE
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Copy of this frame with one cell replaced.
    #[must_use]
    pub fn with_word(&self, cell: usize, word: u32) -> Self {
        let mut words = self.words;
        words[cell] = word;
        Self { words }
    }
}

impl std::fmt::Debug for CodeFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeFrame")
            .field("head", &format_args!("{:08X?}", &self.words[..4]))
            .field("len", &FRAME_SIZE)
            .finish()
    }
}

impl From<[u32; FRAME_SIZE]> for CodeFrame {
    fn from(words: [u32; FRAME_SIZE]) -> Self {
        Self { words }
    }
}

impl TryFrom<Vec<u32>> for CodeFrame {
    type Error = FrameLengthError;

    fn try_from(words: Vec<u32>) -> Result<Self, Self::Error> {
        Self::from_words(&words)
    }
}

impl TryFrom<&[u32]> for CodeFrame {
    type Error = FrameLengthError;

    fn try_from(words: &[u32]) -> Result<Self, Self::Error> {
        Self::from_words(words)
    }
}

impl From<CodeFrame> for Vec<u32> {
    fn from(frame: CodeFrame) -> Self {
        frame.words.to_vec()
    }
}
