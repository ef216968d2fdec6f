//! Driver Authentication Module
//!
//! Username/password accounts for drivers and admins:
//! - Registration form validation
//! - Salted password digests
//! - Login / logout of the current driver
//! - Admin login and default admin seeding

mod password;
mod validation;

pub use password::{hash_password, verify_password};
pub use validation::{RegistrationForm, ValidRegistration, MINIMUM_DRIVER_AGE};

use std::sync::Arc;
use storage::{Admin, Driver, DriverDirectory, NewDriver, StorageError};
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

/// Authentication error types. Messages are shown to the user as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("All fields must be filled")]
    MissingFields,

    #[error("Age must be a number")]
    AgeNotNumber,

    #[error("Driver must be at least 18 years old")]
    Underage,

    #[error("Please enter a valid phone number")]
    InvalidPhone,

    #[error("Username already exists")]
    UsernameTaken,

    #[error("Please enter both username and password")]
    MissingCredentials,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Please end your journey before logging out")]
    JourneyActive,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Authentication module
pub struct AuthModule {
    directory: Arc<dyn DriverDirectory>,

    /// Current authenticated driver
    current_driver: Option<Driver>,
}

impl AuthModule {
    pub fn new(directory: Arc<dyn DriverDirectory>) -> Self {
        Self {
            directory,
            current_driver: None,
        }
    }

    /// Validate and store a new driver
    pub async fn register(&self, form: &RegistrationForm) -> Result<Driver, AuthError> {
        let valid = form.validate()?;

        if self
            .directory
            .find_driver_by_username(&valid.username)
            .await?
            .is_some()
        {
            return Err(AuthError::UsernameTaken);
        }

        let new_driver = NewDriver {
            password_hash: hash_password(&valid.username, &valid.password),
            name: valid.name,
            age: valid.age,
            gender: valid.gender,
            license_no: valid.license_no,
            place: valid.place,
            phone: valid.phone,
            username: valid.username,
        };

        let driver = match self.directory.insert_driver(&new_driver).await {
            Ok(driver) => driver,
            Err(StorageError::Conflict(_)) => return Err(AuthError::UsernameTaken),
            Err(e) => return Err(e.into()),
        };
        info!(driver_id = driver.id, username = %driver.username, "Driver registered");
        Ok(driver)
    }

    /// Authenticate a driver and make them the current driver
    pub async fn login(&mut self, username: &str, password: &str) -> Result<Driver, AuthError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let driver = match self.directory.find_driver_by_username(username).await? {
            Some(driver) if verify_password(username, password, &driver.password_hash) => driver,
            _ => {
                warn!(username, "Driver login failed");
                return Err(AuthError::InvalidCredentials);
            }
        };

        info!(driver_id = driver.id, "Driver logged in");
        self.current_driver = Some(driver.clone());
        Ok(driver)
    }

    /// Get current authenticated driver
    pub fn current_driver(&self) -> Option<&Driver> {
        self.current_driver.as_ref()
    }

    /// Clear authentication. Refused while the driver has a journey running.
    pub fn logout(&mut self, journey_active: bool) -> Result<(), AuthError> {
        if journey_active {
            return Err(AuthError::JourneyActive);
        }
        if let Some(driver) = self.current_driver.take() {
            info!(driver_id = driver.id, "Driver logged out");
        }
        Ok(())
    }

    pub async fn admin_login(&self, username: &str, password: &str) -> Result<Admin, AuthError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        match self.directory.find_admin_by_username(username).await? {
            Some(admin) if verify_password(username, password, &admin.password_hash) => Ok(admin),
            _ => {
                warn!(username, "Admin login failed");
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    /// Seed the default admin account if it does not exist yet
    pub async fn ensure_default_admin(&self) -> Result<bool, AuthError> {
        let hash = hash_password(DEFAULT_ADMIN_USERNAME, DEFAULT_ADMIN_PASSWORD);
        let created = self
            .directory
            .insert_admin_if_missing(DEFAULT_ADMIN_USERNAME, &hash)
            .await?;
        if created {
            info!("Default admin account created");
        }
        Ok(created)
    }
}
