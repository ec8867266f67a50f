pub mod caller;

pub use caller::CallerIdentity;
