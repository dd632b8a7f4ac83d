//! Backend payload shapes for the analysis endpoint.

pub(crate) mod analysis;
