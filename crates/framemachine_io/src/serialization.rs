//! JSON and hex encodings of code frames.
//!
//! JSON is the serde form (an array of exactly 256 words). The hex form is
//! every word as 8 big-endian hex digits, concatenated.

use crate::error::{IoError, Result};
use framemachine_data::{CodeFrame, FRAME_SIZE};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

const WORD_BYTES: usize = std::mem::size_of::<u32>();

pub fn to_json<T>(data: &T) -> Result<String>
where
    T: Serialize,
{
    serde_json::to_string(data)
        .map_err(|e| IoError::serialization(format!("JSON serialization failed: {}", e)))
}

pub fn to_json_pretty<T>(data: &T) -> Result<String>
where
    T: Serialize,
{
    serde_json::to_string_pretty(data)
        .map_err(|e| IoError::serialization(format!("JSON serialization failed: {}", e)))
}

/// Deserializes JSON. A code frame of the wrong length is rejected here
/// because `CodeFrame` deserializes through its length check.
pub fn from_json<T>(json: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    if json.trim().is_empty() {
        return Err(IoError::validation("Empty JSON string"));
    }
    serde_json::from_str(json)
        .map_err(|e| IoError::serialization(format!("JSON deserialization failed: {}", e)))
}

#[must_use]
pub fn code_frame_to_hex(frame: &CodeFrame) -> String {
    let bytes: Vec<u8> = frame
        .words()
        .iter()
        .flat_map(|w| w.to_be_bytes())
        .collect();
    hex::encode(bytes)
}

pub fn code_frame_from_hex(hex_str: &str) -> Result<CodeFrame> {
    let hex_str = hex_str.trim();
    if hex_str.is_empty() {
        return Err(IoError::validation("Empty hex string"));
    }
    let bytes = hex::decode(hex_str)
        .map_err(|e| IoError::validation(format!("Invalid hex encoding: {}", e)))?;
    if bytes.len() % WORD_BYTES != 0 {
        return Err(IoError::validation(format!(
            "Hex holds {} bytes, not a whole number of words",
            bytes.len()
        )));
    }
    let words: Vec<u32> = bytes
        .chunks_exact(WORD_BYTES)
        .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    Ok(CodeFrame::from_words(&words)?)
}

/// SHA-256 of the program words, hex encoded.
#[must_use]
pub fn code_digest(frame: &CodeFrame) -> String {
    let mut hasher = Sha256::new();
    for word in frame.words() {
        hasher.update(word.to_be_bytes());
    }
    hex::encode(hasher.finalize())
}

pub fn write_json_file<T, P>(data: &T, path: P) -> Result<()>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let json = to_json_pretty(data)?;
    std::fs::write(&path, json).map_err(|e| {
        IoError::FileSystem(e).with_context(format!("writing JSON to {:?}", path.as_ref()))
    })?;
    Ok(())
}

pub fn read_json_file<T, P>(path: P) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
    P: AsRef<Path>,
{
    let json = std::fs::read_to_string(&path).map_err(|e| {
        IoError::FileSystem(e).with_context(format!("reading JSON from {:?}", path.as_ref()))
    })?;
    from_json(&json).map_err(|e| e.with_context(format!("parsing {:?}", path.as_ref())))
}

/// Number of hex digits in an encoded frame.
pub const HEX_LEN: usize = FRAME_SIZE * WORD_BYTES * 2;
