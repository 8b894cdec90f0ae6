use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::models::attendance::AttendanceRecord;
use crate::models::classroom::Classroom;
use crate::models::session::ActiveSession;
use crate::models::user::{Student, Teacher, TimetableSlot, Timetable, User};

/// WAL operation types, one JSON object per line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum WalOperation {
    CreateUser {
        user: User,
    },
    CreateStudent {
        user: User,
        student: Student,
    },
    CreateTeacher {
        user: User,
        teacher: Teacher,
    },
    AssignSection {
        usns: Vec<String>,
        department: String,
        year: u32,
        section: String,
    },
    SetTimetable {
        teacher_id: String,
        timetable: Timetable,
    },
    AddTimetableSlot {
        teacher_id: String,
        slot: TimetableSlot,
    },
    SaveClassroom {
        classroom: Classroom,
    },
    OpenSession {
        session: ActiveSession,
        version: u64,
    },
    StopSession {
        session_id: String,
    },
    RecordMark {
        record: AttendanceRecord,
    },
    RecordBatch {
        records: Vec<AttendanceRecord>,
    },
}

impl WalOperation {
    fn to_line(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize WAL operation")
    }

    fn from_line(line: &str) -> Result<Self> {
        serde_json::from_str(line).context("Invalid WAL line")
    }
}

/// Durable sink for state changes.
///
/// Stores append here before touching memory; an `Err` means the change
/// must not be applied.
pub trait Journal: Send + Sync {
    fn append(&self, op: &WalOperation) -> Result<()>;
}

pub struct Wal {
    file: Arc<Mutex<File>>,
    path: PathBuf,
}

impl Wal {
    pub fn new(path: PathBuf) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .context("Failed to open WAL file")?;

        seal_torn_tail(&mut file)?;

        Ok(Wal {
            file: Arc::new(Mutex::new(file)),
            path,
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn log_operation(&self, op: &WalOperation) -> Result<()> {
        // Serialize first so a single write carries the whole line
        let mut line = op.to_line()?;
        line.push('\n');

        let mut file = self
            .file
            .lock()
            .map_err(|_| anyhow!("WAL file lock poisoned"))?;
        let start = file.metadata().context("Failed to stat WAL")?.len();

        let written = file
            .write_all(line.as_bytes())
            .context("Failed to write to WAL")
            .and_then(|_| file.flush().context("Failed to flush WAL"));

        if let Err(e) = written {
            // Cut off any partial line so the next append starts clean
            if let Err(truncate_err) = file.set_len(start) {
                tracing::error!(
                    path = %self.path.display(),
                    offset = start,
                    error = %truncate_err,
                    "Failed to truncate partial WAL write"
                );
            }
            return Err(e);
        }
        Ok(())
    }

    pub fn replay(&self) -> Result<Vec<WalOperation>> {
        let file = File::open(&self.path).context("Failed to open WAL for replay")?;
        let reader = BufReader::new(file);
        let mut operations = Vec::new();

        for (line_num, line_result) in reader.lines().enumerate() {
            let line = line_result.context("Failed to read line from WAL")?;
            let line = line.trim();

            if line.is_empty() {
                continue;
            }

            // A torn trailing line from a crash is dropped whole
            match WalOperation::from_line(line) {
                Ok(op) => operations.push(op),
                Err(e) => {
                    tracing::warn!(
                        line_num = line_num + 1,
                        error = %e,
                        "Failed to parse WAL line, skipping"
                    );
                }
            }
        }

        Ok(operations)
    }
}

/// Terminate a trailing partial line left by a crash, so replay drops only
/// that fragment and the next append starts on a line of its own.
fn seal_torn_tail(file: &mut File) -> Result<()> {
    let len = file.metadata().context("Failed to stat WAL")?.len();
    if len == 0 {
        return Ok(());
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))
        .context("Failed to seek WAL")?;
    file.read_exact(&mut last)
        .context("Failed to read WAL tail")?;

    if last[0] != b'\n' {
        tracing::warn!(length = len, "WAL ends with a partial line, sealing it");
        file.write_all(b"\n").context("Failed to seal WAL")?;
        file.flush().context("Failed to flush WAL")?;
    }
    Ok(())
}

impl Journal for Wal {
    fn append(&self, op: &WalOperation) -> Result<()> {
        self.log_operation(op)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Journal kept in memory, with a switch to make every append fail.
    #[derive(Default)]
    pub struct MemoryJournal {
        pub ops: Mutex<Vec<WalOperation>>,
        pub fail: AtomicBool,
    }

    impl MemoryJournal {
        pub fn failing() -> Self {
            let journal = Self::default();
            journal.fail.store(true, Ordering::SeqCst);
            journal
        }

        pub fn set_failing(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        pub fn len(&self) -> usize {
            self.ops.lock().unwrap().len()
        }
    }

    impl Journal for MemoryJournal {
        fn append(&self, op: &WalOperation) -> Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(anyhow!("simulated write failure"));
            }
            self.ops.lock().unwrap().push(op.clone());
            Ok(())
        }
    }
}
