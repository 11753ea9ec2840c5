//! Ripple Core
//!
//! This crate provides the dependency-tracking engine underneath the Ripple
//! reactive UI runtime. It implements:
//!
//! - Reactive primitives (values, expressions, observers)
//! - Dynamic dependency discovery through per-execution contexts
//! - Forward invalidation over a one-shot edge graph
//! - A flush scheduler that batches observer outputs
//!
//! Rendering, transport and session lifecycle belong to the host.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: The session object and the typed node handles
//! - `graph`: Node arena, edge index, invalidation walk and flush queue
//! - `driver`: An async task that flushes a runtime on request
//! - `config`, `error`: Limits and the error type
//!
//! # Example
//!
//! ```rust
//! use ripple_core::reactive::Runtime;
//!
//! let rt = Runtime::new();
//! let x = rt.create_value(5);
//! let double = {
//!     let x = x.clone();
//!     rt.create_expression(move || Ok(x.get()? * 2))
//! };
//!
//! let weak = rt.downgrade();
//! rt.create_observer(0, move || weak.emit("double", double.get()?));
//!
//! let batch = rt.request_flush().unwrap();
//! assert_eq!(batch.outputs["double"], 10);
//!
//! // Update the value; the observer reruns on the next flush.
//! x.set(7).unwrap();
//! let batch = rt.request_flush().unwrap();
//! assert_eq!(batch.outputs["double"], 14);
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod graph;
pub mod reactive;

pub use config::RuntimeConfig;
pub use error::{ReactiveError, Result};
