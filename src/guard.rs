//! Reentrancy guard.
//!
//! A held/free flag shared by every handle cloned from the same guard.
//! Entering returns a token; dropping the token frees the flag, so the
//! guard is released on every exit path including early `?` returns.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Error, Result};

#[derive(Clone, Debug, Default)]
pub struct ReentrancyGuard {
    entered: Arc<AtomicBool>,
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the guard, failing with [`Error::Reentrant`] if it is held.
    pub fn enter(&self) -> Result<Entered> {
        self.entered
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::Reentrant)?;
        Ok(Entered {
            flag: Arc::clone(&self.entered),
        })
    }

    pub fn is_entered(&self) -> bool {
        self.entered.load(Ordering::Acquire)
    }
}

/// Proof that the guard is held. Releases it on drop.
#[derive(Debug)]
pub struct Entered {
    flag: Arc<AtomicBool>,
}

impl Drop for Entered {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
