//! Sub-sample vertex fitting helpers.

pub(crate) mod quad1d;
pub(crate) mod quad2d;
