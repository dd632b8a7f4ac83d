//! Transform adapters from backend payload shapes into display-ready view models.

pub(crate) mod analysis;
