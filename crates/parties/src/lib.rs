//! Customers as mirrored on-device.
//!
//! The backend owns customer data; this crate only states the local record
//! shape and how remote rows map onto it.

pub mod customer;

pub use customer::{CUSTOMER_SCHEMA, CustomerRecord};
