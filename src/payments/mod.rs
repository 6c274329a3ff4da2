pub(crate) mod stripe;

pub use stripe::*;
