//! Request identity definitions.

use std::str::FromStr;

use axum::{async_trait, extract::FromRequestParts};
use service::domain::user;

use crate::{define_error, Error};

/// Name of the HTTP header carrying the authenticated user ID.
pub const USER_ID_HEADER: &str = "X-User-Id";

/// Name of the HTTP header carrying the authenticated user [`Role`].
pub const ROLE_HEADER: &str = "X-User-Role";

/// Identity of the authenticated caller, as asserted by the fronting
/// authentication proxy.
#[derive(Clone, Copy, Debug)]
pub struct Identity {
    /// ID of the authenticated user.
    pub user_id: user::Id,

    /// [`Role`] of the authenticated user.
    pub role: Role,
}

impl Identity {
    /// Ensures this [`Identity`] has the [`Role::Admin`] role.
    ///
    /// # Errors
    ///
    /// Errors if the caller is not an admin.
    pub fn require_admin(&self) -> Result<(), Error> {
        if matches!(self.role, Role::Admin) {
            Ok(())
        } else {
            Err(AuthError::AdminRequired.into())
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut http::request::Parts,
        _: &S,
    ) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or(AuthError::IdentityRequired)?
            .to_str()
            .ok()
            .and_then(|v| v.parse::<user::Id>().ok())
            .ok_or(AuthError::InvalidIdentity)?;

        let role = match parts.headers.get(ROLE_HEADER) {
            Some(v) => v
                .to_str()
                .ok()
                .and_then(|v| v.parse::<Role>().ok())
                .ok_or(AuthError::InvalidIdentity)?,
            None => Role::User,
        };

        Ok(Self { user_id, role })
    }
}

/// Role of an authenticated caller.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Role {
    /// Regular marketplace user.
    User,

    /// Moderation staff.
    Admin,
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "USER" => Ok(Self::User),
            "ADMIN" => Ok(Self::Admin),
            _ => Err(()),
        }
    }
}

define_error! {
    enum AuthError {
        #[code = "IDENTITY_REQUIRED"]
        #[status = UNAUTHORIZED]
        #[message = "Identity required"]
        IdentityRequired,

        #[code = "INVALID_IDENTITY"]
        #[status = BAD_REQUEST]
        #[message = "Invalid identity headers"]
        InvalidIdentity,

        #[code = "ADMIN_REQUIRED"]
        #[status = FORBIDDEN]
        #[message = "Admin role required"]
        AdminRequired,
    }
}

#[cfg(test)]
mod spec {
    use super::Role;

    #[test]
    fn parses_role_case_insensitively() {
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!("ADMIN".parse::<Role>(), Ok(Role::Admin));
        assert_eq!("User".parse::<Role>(), Ok(Role::User));
        assert!("owner".parse::<Role>().is_err());
    }
}
