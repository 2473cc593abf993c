/// Authentication module
///
/// Token signing/verification, password hashing, revocation tracking and
/// the `TokenService` that ties them together.

mod claims;
mod jwt;
mod password;
mod revocation;
mod token_service;

pub use claims::{Claims, TokenPurpose};
pub use jwt::{generate_token, validate_token};
pub use password::{hash_password, verify_password};
pub use revocation::{optimal_bits, RevocationFilter, MAX_HASH_FUNCTIONS};
pub use token_service::{bearer_token, TokenPair, TokenService};
