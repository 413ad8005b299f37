pub mod checkout;
pub mod error;
pub mod gateway;
pub mod momo;
pub mod types;
pub mod utils;

pub use checkout::{
    CheckoutConfig, CheckoutEvent, CheckoutLauncher, CheckoutResponse, CheckoutSession,
    ConnectionMode, RelayCheckout,
};
pub use error::{PaymentError, PaymentResult};
pub use gateway::{CollectionGateway, HttpCollectionGateway};
pub use types::*;
