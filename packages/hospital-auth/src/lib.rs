//! Hospital Auth - Autenticação compartilhada do sistema hospitalar
//!
//! Esta biblioteca fornece:
//! - Hash e verificação de senhas com Argon2id
//! - Emissão e verificação de tokens de sessão (JWT) vinculados a um papel

pub mod error;
pub mod password;
pub mod token;

pub use error::AuthError;
pub use hospital_db::models::Role;
pub use password::{hash_password, verify_password, MIN_PASSWORD_LENGTH};
pub use token::{Claims, TokenService};
