//! Utility library for the teleoperation control software
//!
//! Everything here is independent of the controller itself: sessions and their archives,
//! logging, parameter files and a few numeric helpers.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod archive;
pub mod host;
pub mod logger;
pub mod maths;
pub mod module;
pub mod params;
pub mod session;
pub mod time;

// ---------------------------------------------------------------------------
// MACROS
// ---------------------------------------------------------------------------

/// Log an error and panic.
///
/// Only for broken invariants in the calling code. Anything a parameter file or a peer can
/// cause shall be returned as an error instead.
#[macro_export]
macro_rules! raise_error {
    () => {
        $crate::raise_error!("Explicit error raised")
    };
    ($($arg:tt)+) => {{
        let msg = std::format!($($arg)+);
        log::error!("{}", msg);
        std::panic!("Unrecoverable error: {}", msg);
    }};
}
