// Response validation

use crate::status::StatusClass;
use crate::{Error, HttpRequest, HttpResponse, Result};
use tracing::debug;

/// Check a response produced by a middleware step
///
/// Success and informational responses pass. A redirect passes only with a
/// `Location` header. Error statuses are turned into the matching [`Error`]
/// so the chain stops, and anything at 600 or above is a generic HTTP error.
pub fn validate_response(request: &HttpRequest, response: &HttpResponse) -> Result<()> {
    let status = response.status;

    let error = match StatusClass::of(status) {
        StatusClass::Informational | StatusClass::Success => return Ok(()),
        StatusClass::Redirection if response.has_header("Location") => return Ok(()),
        StatusClass::Redirection => Error::http(status),
        StatusClass::ClientError | StatusClass::ServerError => map_error_status(request, response),
        // Below 100 is left alone; only the upper bound is enforced
        StatusClass::Invalid if status < 100 => return Ok(()),
        StatusClass::Invalid => Error::http(status),
    };

    debug!(
        status,
        method = %request.method,
        path = %request.path,
        "Response failed validation"
    );
    Err(error)
}

fn map_error_status(request: &HttpRequest, response: &HttpResponse) -> Error {
    match response.status {
        400 => Error::BadRequest(request.path.clone()),
        401 => Error::Unauthorized(request.path.clone()),
        403 => Error::Forbidden(request.path.clone()),
        404 => Error::RouteNotFound(request.path.clone()),
        405 => Error::MethodNotAllowed(request.method.clone()),
        500 => Error::Internal(request.path.clone()),
        501 => Error::NotImplemented(request.method.clone()),
        503 => Error::ServiceUnavailable(request.path.clone()),
        status => Error::Http {
            status,
            reason: response.reason_phrase().to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(status: u16) -> Result<()> {
        validate_response(&HttpRequest::get("/users/7"), &HttpResponse::new(status))
    }

    #[test]
    fn test_success_passes() {
        assert!(check(200).is_ok());
        assert!(check(204).is_ok());
        assert!(check(101).is_ok());
    }

    #[test]
    fn test_redirect_needs_location() {
        let request = HttpRequest::get("/old");
        assert!(validate_response(&request, &HttpResponse::redirect("/new")).is_ok());
        assert_eq!(check(302), Err(Error::http(302)));
        assert_eq!(check(399), Err(Error::http(399)));
    }

    #[test]
    fn test_mapped_statuses() {
        assert_eq!(check(400), Err(Error::BadRequest("/users/7".into())));
        assert_eq!(check(401), Err(Error::Unauthorized("/users/7".into())));
        assert_eq!(check(403), Err(Error::Forbidden("/users/7".into())));
        assert_eq!(check(404), Err(Error::RouteNotFound("/users/7".into())));
        assert_eq!(check(405), Err(Error::MethodNotAllowed("GET".into())));
        assert_eq!(check(500), Err(Error::Internal("/users/7".into())));
        assert_eq!(check(501), Err(Error::NotImplemented("GET".into())));
        assert_eq!(check(503), Err(Error::ServiceUnavailable("/users/7".into())));
    }

    #[test]
    fn test_unlisted_errors_carry_reason() {
        assert_eq!(
            check(409),
            Err(Error::Http {
                status: 409,
                reason: "Conflict".into()
            })
        );

        let response = HttpResponse::new(499).with_reason("Client Closed Request");
        assert_eq!(
            validate_response(&HttpRequest::get("/"), &response),
            Err(Error::Http {
                status: 499,
                reason: "Client Closed Request".into()
            })
        );
    }

    #[test]
    fn test_out_of_range_fails() {
        assert_eq!(check(620), Err(Error::http(620)));
        assert!(matches!(check(600), Err(Error::Http { status: 600, .. })));
    }
}
