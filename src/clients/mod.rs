pub mod gcs;
pub mod plaid;
pub mod stripe;

pub use gcs::UploadSigner;
pub use plaid::{BankLinkPlatform, PlaidClient};
pub use stripe::{PaymentsPlatform, StripeClient};
