//! Authentication management for object store credentials
//!
//! This module provides functions for managing the access keys used against
//! the requester-pays LIDAR bucket, including interactive setup,
//! verification, and storage in .env files.
//!
//! # Examples
//!
//! ```rust,no_run
//! use lidar_fetcher::app::store::StoreConfig;
//! use lidar_fetcher::auth::{check_credentials, setup_credentials};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! if !check_credentials() {
//!     println!("Setting up credentials...");
//!     setup_credentials(&StoreConfig::default()).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod credentials;

// Re-export main public API
pub use credentials::{
    check_credentials, get_auth_status, prompt_credentials, save_credentials,
    save_credentials_to, setup_credentials, show_auth_status, validate_access_key_id,
    verify_credentials, verify_with_store, AuthStatus,
};
