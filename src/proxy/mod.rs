//! Outbound transport: relay registry, request building, response
//! normalization and the ordered relay chain.

pub mod direct;
pub mod normalize;
pub mod registry;
pub mod request;
pub mod resolver;
pub mod transport;
