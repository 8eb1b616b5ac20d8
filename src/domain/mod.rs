//! Domain layer: records, value objects, transition rules and the ports the
//! application layer talks to.

pub mod contact;
pub mod ids;
pub mod payment_request;
pub mod ports;
pub mod user;
