//! Common test utilities and helpers.
//!
//! This module provides shared functionality for all tests, including:
//! - Test fixtures (PDFs, images, recorded analysis responses)
//! - Scripted analyzers standing in for the analysis service
//! - Custom assertions over redacted output

#![allow(dead_code)]

pub mod analyzers;
pub mod assertions;
pub mod fixtures;

pub use analyzers::*;
pub use assertions::*;
pub use fixtures::*;

use std::sync::Mutex;

/// MuPDF keeps global state; tests touching it run one at a time.
pub static MUPDF_LOCK: Mutex<()> = Mutex::new(());

#[macro_export]
macro_rules! with_mupdf_lock {
    ($body:expr) => {{
        let _guard = $crate::common::MUPDF_LOCK
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        $body
    }};
}
