//! The two disciplines (C4, C5) that pump an [`crate::op::OperationMachine`]
//! to completion. Both run the identical machine logic; they differ only
//! in how they wait between non-blocking I/O attempts.

pub mod asynchronous;
pub mod sync;
