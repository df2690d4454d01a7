//! Status codes and the thread-local last-error message.
//!
//! Front ends that report a flat status (a CLI, a foreign-language binding)
//! convert every `Result` through [`status`] or [`poll_status`] and fetch the
//! human-readable reason with [`last_error`] on the same thread.

use std::cell::RefCell;
use std::fmt;

use crate::error::{Ed247Error, Result};

thread_local! {
    static LAST_ERROR: RefCell<String> = const { RefCell::new(String::new()) };
}

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success = 0,
    Failure = 1,
    Timeout = 2,
    NoData = 3,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
            Self::Timeout => "TIMEOUT",
            Self::NoData => "NODATA",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The last error recorded on this thread, empty after a success.
pub fn last_error() -> String {
    LAST_ERROR.with(|state| state.borrow().clone())
}

pub fn clear_last_error() {
    LAST_ERROR.with(|state| state.borrow_mut().clear());
}

fn set_last_error(err: &Ed247Error) {
    let message = err.to_string();
    LAST_ERROR.with(|state| *state.borrow_mut() = message);
}

/// Status of a completed operation.
pub fn status<T>(result: &Result<T>) -> Status {
    match result {
        Ok(_) => {
            clear_last_error();
            Status::Success
        }
        Err(err) => {
            set_last_error(err);
            match err {
                Ed247Error::Timeout(_) => Status::Timeout,
                _ => Status::Failure,
            }
        }
    }
}

/// Status of an operation that may find nothing to return.
pub fn poll_status<T>(result: &Result<Option<T>>) -> Status {
    if let Ok(None) = result {
        clear_last_error();
        return Status::NoData;
    }
    status(result)
}

/// Conversion of a runtime result into a flat [`Status`].
///
/// Results that may legitimately hold nothing (`pop`) should go through
/// [`poll_status`] to report [`Status::NoData`].
pub trait IntoStatus {
    fn into_status(self) -> Status;
}

impl<T> IntoStatus for Result<T> {
    fn into_status(self) -> Status {
        status(&self)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn success_clears_last_error() {
        let failed: Result<()> = Err(Ed247Error::config("channel [A] already exists"));
        assert_eq!(status(&failed), Status::Failure);
        assert_eq!(
            last_error(),
            "configuration error: channel [A] already exists"
        );

        assert_eq!(status(&Ok(5)), Status::Success);
        assert!(last_error().is_empty());
    }

    #[test]
    fn timeout_maps_to_timeout_status() {
        let waited: Result<()> = Err(Ed247Error::Timeout(Duration::from_millis(10)));
        assert_eq!(status(&waited), Status::Timeout);
        assert!(last_error().contains("timed out"));
    }

    #[test]
    fn empty_poll_is_no_data() {
        let popped: Result<Option<u8>> = Ok(None);
        assert_eq!(poll_status(&popped), Status::NoData);
        assert_eq!(poll_status(&Ok(Some(1u8))), Status::Success);
    }

    #[test]
    fn last_error_is_per_thread() {
        let failed: Result<()> = Err(Ed247Error::ContextOwned);
        status(&failed);
        let other = std::thread::spawn(last_error).join().unwrap();
        assert!(other.is_empty());
        assert!(!last_error().is_empty());
    }

    #[test]
    fn into_status_records_the_error() {
        let result: Result<u8> = Err(Ed247Error::NotFound {
            kind: "stream",
            name: "Missing".into(),
        });
        assert_eq!(result.into_status(), Status::Failure);
        assert_eq!(last_error(), "stream [Missing] not found");
        assert_eq!(Ok::<_, Ed247Error>(()).into_status(), Status::Success);
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(Status::Success as i32, 0);
        assert_eq!(Status::Failure as i32, 1);
        assert_eq!(Status::Timeout as i32, 2);
        assert_eq!(Status::NoData as i32, 3);
        assert_eq!(Status::NoData.to_string(), "NODATA");
    }
}
