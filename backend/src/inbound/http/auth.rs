//! Bearer-token extraction for HTTP handlers.
//!
//! Token issuance and validation belong to the external identity
//! collaborator; this module only lifts the credential off the request so
//! handlers can resolve it through the [`IdentityProvider`] port.

use actix_web::{FromRequest, HttpRequest, dev::Payload, http::header};
use futures_util::future::{Ready, ready};

use crate::domain::ports::{IdentityError, IdentityProvider};
use crate::domain::{Error, UserId};

/// Raw bearer credential presented on a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    /// Borrow the raw token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    fn parse(request: &HttpRequest) -> Result<Self, Error> {
        let header_value = request
            .headers()
            .get(header::AUTHORIZATION)
            .ok_or_else(|| Error::unauthorized("missing Authorization header"))?;
        let raw = header_value
            .to_str()
            .map_err(|_| Error::unauthorized("malformed Authorization header"))?;
        let token = raw
            .strip_prefix("Bearer ")
            .ok_or_else(|| Error::unauthorized("Authorization header must use the Bearer scheme"))?;
        if token.is_empty() {
            return Err(Error::unauthorized("empty bearer token"));
        }
        Ok(Self(token.to_owned()))
    }
}

impl FromRequest for BearerToken {
    type Error = Error;
    type Future = Ready<Result<Self, Error>>;

    fn from_request(request: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Self::parse(request))
    }
}

/// Resolve the presented credential to a caller identity or `401`.
pub async fn authenticate(
    identity: &dyn IdentityProvider,
    token: &BearerToken,
) -> Result<UserId, Error> {
    identity.resolve(token.as_str()).await.map_err(|error| match error {
        IdentityError::Unverified { .. } => Error::unauthorized("invalid bearer token"),
        IdentityError::Unavailable { message } => {
            Error::service_unavailable(format!("identity provider unavailable: {message}"))
        }
    })
}
