//! Journal writer (C12) and subledger control registry (C13), spec
//! §4.12/§4.13.

#![deny(unsafe_code)]

mod subledger;
mod writer;

pub use subledger::{SubledgerRegistry, SubledgerReconciliationError};
pub use writer::{JournalError, JournalWriter, WriteResult};
