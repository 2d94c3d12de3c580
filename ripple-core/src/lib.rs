//! Ripple Core
//!
//! This crate provides the dependency-tracking core of the Ripple
//! reactive state framework. It implements:
//!
//! - Reactive primitives (signals, computed values, effects)
//! - Automatic dependency tracking with a thread-local running-effect
//!   context
//! - Pluggable effect scheduling (inline, synchronous, queued)
//! - The ordered-container and typed event-bus building blocks the
//!   engine is assembled from
//!
//! The crate is UI-agnostic: it is the reactivity layer beneath state
//! management or rendering layers, not a framework itself.
//!
//! # Architecture
//!
//! The crate is organized into three modules:
//!
//! - `reactive`: signals, computed values, effects, observers,
//!   schedulers, and the tracking context
//! - `collections`: bounded stack/queue primitives with optional
//!   uniqueness
//! - `event`: a typed publish/subscribe bus used for effect lifecycle
//!   hooks
//!
//! # Example
//!
//! ```rust,ignore
//! use ripple_core::reactive::{create_computed, create_effect, create_signal};
//!
//! // Create a signal
//! let count = create_signal(0);
//!
//! // Create a derived value
//! let doubled = create_computed({
//!     let count = count.clone();
//!     move || count.get() * 2
//! });
//!
//! // Create an effect
//! create_effect({
//!     let count = count.clone();
//!     let doubled = doubled.clone();
//!     move || println!("count: {}, doubled: {}", count.get(), doubled.get())
//! });
//!
//! // Update the signal
//! count.set(5);
//! // Effect automatically re-runs, prints: "count: 5, doubled: 10"
//! ```

pub mod collections;
pub mod event;
pub mod reactive;
