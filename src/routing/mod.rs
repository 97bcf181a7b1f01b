//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path, query)
//!     → direct.rs (`/proxy/{url}` or `/{absolute-url}` decoding)
//!     → router.rs (longest prefix lookup)
//!     → matcher.rs (segment-boundary prefix match)
//!     → Return: upstream URL or NoMatch
//!
//! Route Compilation (at startup):
//!     routes = { key = "origin" }
//!     → Normalize keys and origins
//!     → Sort by prefix length, longest first
//!     → Freeze as immutable RoutingTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route
//! - Most specific prefix wins regardless of configuration order

pub mod direct;
pub mod matcher;
pub mod router;

pub use router::{RouteEntry, RoutingError, RoutingTable};
