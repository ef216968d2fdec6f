//! Registration form validation

use crate::AuthError;
use serde::Deserialize;

pub const MINIMUM_DRIVER_AGE: u32 = 18;
pub const MINIMUM_PHONE_DIGITS: usize = 10;

/// Registration form as entered by the user, every field raw text
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistrationForm {
    pub name: String,
    pub age: String,
    pub gender: String,
    pub license_no: String,
    pub place: String,
    pub phone: String,
    pub username: String,
    pub password: String,
}

/// Validated registration, ready to be hashed and stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidRegistration {
    pub name: String,
    pub age: u32,
    pub gender: String,
    pub license_no: String,
    pub place: String,
    pub phone: String,
    pub username: String,
    pub password: String,
}

impl RegistrationForm {
    /// Check the form in the order the user sees the messages.
    ///
    /// Username uniqueness needs the directory and is checked by the caller.
    pub fn validate(&self) -> Result<ValidRegistration, AuthError> {
        let fields = [
            &self.name,
            &self.age,
            &self.gender,
            &self.license_no,
            &self.place,
            &self.phone,
            &self.username,
            &self.password,
        ];
        if fields.iter().any(|f| f.trim().is_empty()) {
            return Err(AuthError::MissingFields);
        }

        let age: i64 = self
            .age
            .trim()
            .parse()
            .map_err(|_| AuthError::AgeNotNumber)?;
        if age < i64::from(MINIMUM_DRIVER_AGE) {
            return Err(AuthError::Underage);
        }
        let age = u32::try_from(age).map_err(|_| AuthError::AgeNotNumber)?;

        let phone = self.phone.trim();
        if phone.len() < MINIMUM_PHONE_DIGITS || !phone.chars().all(|c| c.is_ascii_digit()) {
            return Err(AuthError::InvalidPhone);
        }

        Ok(ValidRegistration {
            name: self.name.trim().to_string(),
            age,
            gender: self.gender.trim().to_string(),
            license_no: self.license_no.trim().to_string(),
            place: self.place.trim().to_string(),
            phone: phone.to_string(),
            username: self.username.trim().to_string(),
            password: self.password.clone(),
        })
    }
}
