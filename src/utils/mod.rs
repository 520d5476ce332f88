// Utility modules for reviewflow-backend

pub mod password;
pub mod service_error;
pub mod validation;

pub use password::{hash_password, verify_password, PasswordError};
pub use service_error::ServiceError;
pub use validation::{normalize_email, trim_and_validate_field, trim_optional_field};
