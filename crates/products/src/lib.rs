//! Product catalog as mirrored on-device.

pub mod product;

pub use product::{PRODUCT_SCHEMA, ProductRecord};
