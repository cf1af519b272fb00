mod fiat;
mod musd;

pub mod helpers;
pub mod op;
mod secret;

pub use fiat::{Fiat, FIAT_CURRENCY_CODE};
pub use musd::{Musd, MusdConversionError, MUSD_CURRENCY_CODE};
pub use secret::Secret;
