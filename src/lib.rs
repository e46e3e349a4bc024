//! Leadform - Email Capture Form Controller
//!
//! This crate implements the interactive core of a landing page email-capture
//! form: a debounce gate on the submit entry point, a locally persisted cache
//! of already-submitted emails with time-based expiry, anti-abuse token
//! acquisition and a single outbound form submission per attempt.

pub mod adapters;
pub mod config;
pub mod debounce;
pub mod error;
pub mod submission;
