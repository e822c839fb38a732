//! I/O utilities for persistence operations.

use std::io::ErrorKind;
use std::time::Duration;

use crate::error::DbError;

/// Classifies snapshot I/O errors into specific DbError variants.
///
/// Only interruptions and timeouts count as transient. A data directory that
/// cannot be written, or whose path is taken by a regular file, is reported
/// as a permanent `IoError` naming the cause.
pub fn classify_io_error(error: std::io::Error, context: &str) -> DbError {
    match error.kind() {
        ErrorKind::StorageFull | ErrorKind::OutOfMemory => {
            DbError::DiskFull(format!("{}: {}", context, error))
        }
        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted => {
            DbError::TransientIoError(format!("{}: {}", context, error))
        }
        ErrorKind::ReadOnlyFilesystem | ErrorKind::PermissionDenied => DbError::IoError(format!(
            "{}: data directory is not writable: {}",
            context, error
        )),
        ErrorKind::NotADirectory | ErrorKind::AlreadyExists => DbError::IoError(format!(
            "{}: data directory path is not a directory: {}",
            context, error
        )),
        _ => DbError::IoError(format!("{}: {}", context, error)),
    }
}

/// Runs `operation`, retrying up to `max_retries` times while it fails with
/// `TransientIoError`. Any other error is returned immediately.
pub fn retry_io_operation<F, T>(
    mut operation: F,
    max_retries: u32,
    retry_delay_ms: u64,
    context: &str,
) -> Result<T, DbError>
where
    F: FnMut() -> Result<T, DbError>,
{
    let mut attempt = 0;
    loop {
        match operation() {
            Ok(result) => return Ok(result),
            Err(DbError::TransientIoError(msg)) if attempt < max_retries => {
                attempt += 1;
                tracing::warn!(
                    "Transient I/O error in {} (attempt {}/{}): {}",
                    context,
                    attempt,
                    max_retries,
                    msg
                );
                if retry_delay_ms > 0 {
                    std::thread::sleep(Duration::from_millis(retry_delay_ms));
                }
            }
            Err(err) => return Err(err),
        }
    }
}
