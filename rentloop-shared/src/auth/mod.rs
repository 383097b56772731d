/// Identity primitives
///
/// - [`password`]: Argon2id hashing and the password policy
/// - [`jwt`]: access and password-reset tokens
/// - [`middleware`]: bearer authentication and the `AuthContext` extractor

pub mod jwt;
pub mod middleware;
pub mod password;
