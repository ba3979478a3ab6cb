// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Lock and condition variable types that treat poisoning as fatal.
//!
//! The engine runs with `panic = "abort"` in release builds, so a poisoned lock can only be
//! observed in tests, after another thread already panicked while holding it. Rather than make
//! every caller write `.lock().unwrap()`, the wrappers here panic on poison themselves and hand
//! back plain guards.

mod condvar;
mod mutex;

pub use crate::condvar::Condvar;
pub use crate::mutex::Mutex;
pub use crate::mutex::MutexGuard;
