//! Monte Carlo comparison of buying a home against renting and investing the
//! difference.

pub mod api;
pub mod core;
