//! Authorization for DBRP mapping operations.
//!
//! Every request is made by a [`Caller`], optionally identified by a token.
//! An [`Authorizer`] decides which of the [`Permission`]s an operation needs
//! the caller actually holds.

#![warn(
    missing_docs,
    clippy::explicit_iter_loop,
    clippy::use_self,
)]

use async_trait::async_trait;
use base64::{Engine, prelude::BASE64_STANDARD};
use snafu::Snafu;

mod permission;
pub use permission::{Action, Permission, Resource};

mod token;
pub use token::TokenAuthorizer;

/// Pull the token out of an HTTP `Authorization` header value.
///
/// `Token <t>` and `Bearer <t>` carry the token directly; `Basic` carries
/// `base64(user:<t>)`. Anything else, including an empty token, yields
/// `None`.
pub fn extract_token<T: AsRef<[u8]> + ?Sized>(header: Option<&T>) -> Option<Vec<u8>> {
    let header = header?.as_ref();
    let space = header.iter().position(|&b| b == b' ')?;
    let (scheme, credentials) = (&header[..space], &header[space + 1..]);

    let token = match scheme {
        b"Token" | b"Bearer" => credentials.to_vec(),
        b"Basic" => {
            let decoded = BASE64_STANDARD.decode(credentials).ok()?;
            let colon = decoded.iter().position(|&b| b == b':')?;
            decoded[colon + 1..].to_vec()
        }
        _ => return None,
    };
    (!token.is_empty()).then_some(token)
}

/// The identity attached to a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller {
    token: Option<Vec<u8>>,
}

impl Caller {
    /// A caller that presented no credentials.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A caller identified by `token`.
    pub fn with_token(token: impl Into<Vec<u8>>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    /// Build a caller from the raw value of an `Authorization` header.
    ///
    /// Unrecognised schemes and empty tokens yield an anonymous caller.
    pub fn from_authorization_header<T: AsRef<[u8]> + ?Sized>(header: Option<&T>) -> Self {
        Self {
            token: extract_token(header),
        }
    }

    /// The token presented by this caller, if any.
    pub fn token(&self) -> Option<&[u8]> {
        self.token.as_deref()
    }
}

/// Decides what a [`Caller`] may do.
#[async_trait]
pub trait Authorizer: std::fmt::Debug + Send + Sync {
    /// Return those of `requested` that `caller` holds.
    ///
    /// Fails when the caller cannot be identified, when it holds none of
    /// `requested`, or when the check itself could not be carried out. An
    /// empty `requested` always succeeds.
    async fn permissions(
        &self,
        caller: &Caller,
        requested: &[Permission],
    ) -> Result<Vec<Permission>, Error>;

    /// Succeed only if `caller` holds `perm`.
    async fn authorize(&self, caller: &Caller, perm: Permission) -> Result<(), Error> {
        self.permissions(caller, &[perm]).await.map(|_| ())
    }
}

/// `None` turns authorization off: every caller holds every permission.
#[async_trait]
impl<T: Authorizer> Authorizer for Option<T> {
    async fn permissions(
        &self,
        caller: &Caller,
        requested: &[Permission],
    ) -> Result<Vec<Permission>, Error> {
        let Some(authz) = self else {
            return Ok(requested.to_vec());
        };
        authz.permissions(caller, requested).await
    }
}

/// Lets shared handles such as `Arc<dyn Authorizer>` be used directly.
#[async_trait]
impl<T: AsRef<dyn Authorizer> + std::fmt::Debug + Send + Sync> Authorizer for T {
    async fn permissions(
        &self,
        caller: &Caller,
        requested: &[Permission],
    ) -> Result<Vec<Permission>, Error> {
        self.as_ref().permissions(caller, requested).await
    }
}

/// Why a caller was turned away.
#[derive(Debug, Snafu)]
pub enum Error {
    /// The authorizer could not complete the check.
    #[snafu(display("unable to verify caller: {msg}"))]
    Verification {
        /// What was being attempted.
        msg: String,
        /// Underlying failure.
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// The caller holds none of the requested permissions.
    #[snafu(display("caller is not permitted to perform this operation"))]
    Forbidden,

    /// The caller's token is unknown.
    #[snafu(display("token is not recognised"))]
    InvalidToken,

    /// The caller did not present a token.
    #[snafu(display("request carries no token"))]
    NoToken,
}

impl Error {
    /// Build an [`Error::Verification`].
    pub fn verification(
        msg: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        Self::Verification {
            msg: msg.into(),
            source: source.into(),
        }
    }
}
