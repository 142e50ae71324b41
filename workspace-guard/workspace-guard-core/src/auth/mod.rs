pub mod principals;
pub mod state;
pub mod token;

pub use principals::{extract_principals, principals_from_status, FAKE_USER_PREFIX};
pub use state::{AuthInfo, AuthStateReader, AuthStateStorage, AuthStatus};
pub use token::{Claims, Hs256Verifier, TokenVerifier};
