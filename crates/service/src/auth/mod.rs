//! Collaborators of the login flow that live outside the core crate:
//! password hashes, second-factor codes and signed bearer tokens.

pub mod password;
pub mod token;
pub mod totp;

pub use password::{PasswordError, Passwords};
pub use token::{Claims, IssuedToken, TokenError, TokenIssuer};
pub use totp::{TotpError, TotpFactory};
