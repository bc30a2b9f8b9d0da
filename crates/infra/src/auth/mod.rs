//! Bearer credential acquisition and refresh

pub mod credential_manager;
pub mod login_client;

pub use credential_manager::CredentialManager;
pub use login_client::LoginClient;
