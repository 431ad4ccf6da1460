// Security helpers: credential sealing and digests

pub mod crypto;
pub mod secret_protector;
