//! Debouncing of rapid repeated calls.

mod debouncer;
mod window;

pub use debouncer::Debouncer;
pub use window::WindowState;
