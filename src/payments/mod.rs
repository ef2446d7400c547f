pub mod client;
pub mod ipn;
pub mod types;

pub use client::NowPaymentsClient;
pub use ipn::{parse_verified_callback, IpnPayload};
pub use types::PaymentDetails;
