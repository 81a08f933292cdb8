//! Self-describing tagged values with an application type registry, a
//! primitive conversion matrix, and a flatten protocol for transport.

/// Tagged value container, conversion, registry, flatten, and wire codec.
pub mod gdd;
