//! Ports (hexagonal boundary) of the session core.
//!
//! - `inbound`: what drives the core (event source, inbound event shape)
//! - `outbound`: what the core drives (clock, external response provider)

pub mod inbound;
pub mod outbound;

pub use inbound::{EventSource, InboundEvent};
pub use outbound::{
    ManualTimeSource, ProviderError, ResponseProvider, TimeSource, Timestamp, TokioTimeSource,
};
