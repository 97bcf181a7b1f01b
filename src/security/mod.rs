//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (client IP, strip hop-by-hop)
//!     → Pass to upstream request builder
//!
//! Upstream response:
//!     → headers.rs (strip hop-by-hop and frame/CSP headers)
//!     → Pass to response assembler
//! ```
//!
//! # Design Decisions
//! - No trust in client input: forwarded IPs must parse as addresses

pub mod headers;
