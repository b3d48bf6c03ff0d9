//! Small helpers shared by the endpoint modules.

pub mod glob;
