pub mod dto;
pub mod error;
pub mod jwt;
pub mod signer;
pub mod token;

pub use dto::{IamTokenRequest, IamTokenResponse};
pub use error::AuthError;
pub use jwt::{expand_pem, parse_algorithm, AssertionClaims, ServiceAccountKey};
pub use signer::{CredentialSigner, TokenProvider};
pub use token::AuthToken;
