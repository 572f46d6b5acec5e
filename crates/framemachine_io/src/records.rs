//! Exported machines.
//!
//! A record file is a JSON array of ranked machines, best first. Each record
//! carries a digest of its program that is checked on load.

use crate::error::{IoError, Result};
use crate::serialization::{code_digest, read_json_file, write_json_file};
use framemachine_core::population::{Member, PopulationSnapshot};
use framemachine_core::strategy::Score;
use framemachine_core::Machine;
use framemachine_data::CodeFrame;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineRecord {
    /// Display form of the machine id at export time.
    pub id: String,
    /// Debug form of the score at export time.
    pub score: String,
    pub digest: String,
    pub code: CodeFrame,
}

impl MachineRecord {
    #[must_use]
    pub fn from_member<R: Score>(member: &Member<R>) -> Self {
        let code = member.machine.code().clone();
        Self {
            id: member.machine.id().to_string(),
            score: format!("{:?}", member.score),
            digest: code_digest(&code),
            code,
        }
    }

    /// Checks the stored digest against the program.
    pub fn verify(&self) -> Result<()> {
        let actual = code_digest(&self.code);
        if actual != self.digest {
            return Err(IoError::validation(format!(
                "Digest mismatch for machine {}: stored {}, computed {}",
                self.id, self.digest, actual
            )));
        }
        Ok(())
    }

    /// A fresh machine running this record's program with cleared state.
    #[must_use]
    pub fn to_machine(&self) -> Machine {
        Machine::new(self.code.clone())
    }
}

/// The best `count` members of `snapshot`, best first.
#[must_use]
pub fn export_ranked<R: Score>(snapshot: &PopulationSnapshot<R>, count: usize) -> Vec<MachineRecord> {
    snapshot
        .ranked()
        .into_iter()
        .take(count)
        .map(MachineRecord::from_member)
        .collect()
}

pub fn write_records<P: AsRef<Path>>(records: &[MachineRecord], path: P) -> Result<()> {
    write_json_file(&records, &path)?;
    tracing::info!(path = ?path.as_ref(), count = records.len(), "Machines exported");
    Ok(())
}

/// Loads a record file, rejecting any record whose digest does not match.
pub fn read_records<P: AsRef<Path>>(path: P) -> Result<Vec<MachineRecord>> {
    let records: Vec<MachineRecord> = read_json_file(&path)?;
    for record in &records {
        record
            .verify()
            .map_err(|e| e.with_context(format!("loading {:?}", path.as_ref())))?;
    }
    tracing::info!(path = ?path.as_ref(), count = records.len(), "Machines imported");
    Ok(records)
}
