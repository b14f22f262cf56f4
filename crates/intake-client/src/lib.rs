//! # intake-client: Address Autocomplete
//!
//! A typed client for a Geoapify-style address autocomplete API and a
//! [`Debouncer`] that collapses keystroke bursts into one upstream call.
//!
//! ## Error Handling
//!
//! Transport, status, and decoding failures carry the endpoint for
//! diagnostics. Calls overtaken by a newer one inside the quiet window
//! resolve with [`GeocodeError::Superseded`] and never reach the upstream.

pub mod debounce;
pub mod error;
pub mod geocode;

pub use debounce::{DebouncedLookup, Debouncer, Superseded};
pub use error::GeocodeError;
pub use geocode::{AddressClient, AddressClientConfig, AddressLookup, AddressSuggestion};
