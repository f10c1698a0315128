mod local;

pub use local::{LocalPaymentProvider, LOCAL_PROVIDER_NAME};
