//! Water-test tracking for freshwater aquariums.
//!
//! Two independent pieces, both consumed by the tracker page:
//! - [`classify`] maps a raw reading onto a qualitative [`model::Status`]
//!   using a read-only [`parameters::ReferenceTable`].
//! - [`cache`] keeps the page's static assets available offline.

pub mod cache;
pub mod classify;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod parameters;
