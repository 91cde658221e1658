use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::error::{Result, ZipMatchError};

/// Run a geometry operation, turning a panic inside the geometry library into
/// `GeometryOperationFailure` so one degenerate shape cannot take the request down.
pub fn run_guarded<T>(operation: &str, f: impl FnOnce() -> T) -> Result<T> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        ZipMatchError::GeometryOperationFailure(format!(
            "{} panicked: {}",
            operation,
            panic_message(payload.as_ref())
        ))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
