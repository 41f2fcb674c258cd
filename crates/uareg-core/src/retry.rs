// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Optimistic concurrency retry.
//!
//! Registry mutations are read-modify-write cycles guarded by the twin etag.
//! When the store rejects a write with `ResourceOutOfDate`, the whole cycle
//! is run again from a fresh read. There is no attempt limit and no delay;
//! every other outcome ends the loop.
//!
//! # Example
//!
//! ```rust,ignore
//! use uareg_core::retry::retry_on_out_of_date;
//!
//! retry_on_out_of_date("application", || async {
//!     let twin = store.get(&id, None).await?;
//!     let patch = build_patch(&twin)?;
//!     store.patch(patch, false).await
//! })
//! .await?;
//! ```

use std::future::Future;

use tracing::debug;

use crate::error::RegistryResult;

/// Runs `operation` until it completes with anything but `ResourceOutOfDate`.
///
/// Each attempt is logged at debug level together with the resource it
/// concerns.
pub async fn retry_on_out_of_date<F, Fut, T>(resource: &str, mut operation: F) -> RegistryResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = RegistryResult<T>>,
{
    let mut attempt = 0u64;
    loop {
        attempt += 1;
        match operation().await {
            Err(error) if error.is_out_of_date() => {
                debug!(
                    resource = %resource,
                    attempt = attempt,
                    error = %error,
                    "Resource out of date, retrying"
                );
                tokio::task::yield_now().await;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistryError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retries_until_success() {
        let attempts = AtomicU32::new(0);
        let result = retry_on_out_of_date("app", || async {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            if n < 5 {
                Err(RegistryError::out_of_date("app"))
            } else {
                Ok(n)
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 5);
        assert_eq!(attempts.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_other_errors_end_the_loop() {
        let attempts = AtomicU32::new(0);
        let result: RegistryResult<()> = retry_on_out_of_date("app", || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(RegistryError::not_found("app"))
        })
        .await;
        assert!(result.unwrap_err().is_not_found());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
