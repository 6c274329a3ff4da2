mod checkout;
mod order;

pub use checkout::*;
pub use order::*;
