//! Target controller support.

pub mod profile;

pub use profile::{resolve, Controller, DeviceProfile};
