mod lock;
mod safe_write;

pub use lock::{LockError, RunLock};
pub use safe_write::{AppendReceipt, SafeFileWriter, SafeWriteError, DEFAULT_MAX_RECORD_BYTES};
