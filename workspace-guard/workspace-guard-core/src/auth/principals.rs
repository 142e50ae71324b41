//! Derive the calling principals from a request's authentication state.

use super::state::{AuthStateReader, AuthStatus};
use crate::acl::Principals;
use crate::request::Request;
use crate::utils::generate_random_id;

/// Prefix of the synthetic user given to unauthenticated requests.
pub const FAKE_USER_PREFIX: &str = "_user_fake_";
const FAKE_USER_ID_LEN: usize = 32;

/// Principals of the caller behind `request`.
pub fn extract_principals(request: &Request, auth: &dyn AuthStateReader) -> Principals {
    principals_from_status(&auth.get(request))
}

/// - `Unknown` yields no principals at all.
/// - `Unauthenticated` yields one freshly generated user that no ACL lists.
/// - `Authenticated` yields the backend roles as groups and the user name as
///   the single user; either may be absent.
pub fn principals_from_status(status: &AuthStatus) -> Principals {
    match status {
        AuthStatus::Unknown => Principals::new(),
        AuthStatus::Unauthenticated => Principals::with_users([format!(
            "{}{}",
            FAKE_USER_PREFIX,
            generate_random_id(FAKE_USER_ID_LEN)
        )]),
        AuthStatus::Authenticated(info) => Principals {
            users: info.user_name.iter().cloned().collect(),
            groups: info.backend_roles.clone().unwrap_or_default(),
        },
    }
}
