//! Conversions from external infrastructure errors into domain errors.

use r2d2::Error as PoolError;
use relaybox_domain::RelayError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;

/// Message used for HTTP timeouts so callers can tell them apart from other
/// network failures.
pub const HTTP_TIMEOUT_MESSAGE: &str = "HTTP request timed out";

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub RelayError);

impl From<InfraError> for RelayError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<RelayError> for InfraError {
    fn from(value: RelayError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoRelayError {
    fn into_relay(self) -> RelayError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → RelayError */
/* -------------------------------------------------------------------------- */

impl IntoRelayError for SqlError {
    fn into_relay(self) -> RelayError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => RelayError::Database("database is busy".into()),
                    (ErrorCode::DatabaseLocked, _) => {
                        RelayError::Database("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 1299) => {
                        RelayError::Database("not null constraint violation".into())
                    }
                    (ErrorCode::ConstraintViolation, 2067) => {
                        RelayError::Database("unique constraint violation".into())
                    }
                    (ErrorCode::ReadOnly, _) => RelayError::Database("database is read-only".into()),
                    (ErrorCode::CannotOpen, _) => {
                        RelayError::Database(format!("unable to open database file: {message}"))
                    }
                    _ => RelayError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => RelayError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                RelayError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                RelayError::Database(format!("invalid column type: {ty}"))
            }
            RE::Utf8Error(_) => RelayError::Database("invalid UTF-8 returned from sqlite".into()),
            RE::InvalidPath(path) => RelayError::Database(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            other => RelayError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_relay())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → RelayError */
/* -------------------------------------------------------------------------- */

impl IntoRelayError for PoolError {
    fn into_relay(self) -> RelayError {
        RelayError::Database(format!("connection pool error: {self}"))
    }
}

impl From<PoolError> for InfraError {
    fn from(value: PoolError) -> Self {
        InfraError(value.into_relay())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → RelayError */
/* -------------------------------------------------------------------------- */

impl IntoRelayError for HttpError {
    fn into_relay(self) -> RelayError {
        if self.is_timeout() {
            return RelayError::Network(HTTP_TIMEOUT_MESSAGE.into());
        }

        if self.is_connect() {
            return RelayError::Network("HTTP connection failure".into());
        }

        if self.is_builder() {
            return RelayError::Config(format!("invalid HTTP request: {self}"));
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                401 | 403 => RelayError::Auth(message),
                404 => RelayError::NotFound(message),
                400..=499 => RelayError::InvalidInput(message),
                _ => RelayError::Network(message),
            };
        }

        RelayError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_relay())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use reqwest::{Client, StatusCode};
    use rusqlite::ffi::{Error as FfiError, ErrorCode};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn sqlite_busy_maps_to_database_error() {
        let err = SqlError::SqliteFailure(
            FfiError { code: ErrorCode::DatabaseBusy, extended_code: 5 },
            Some("database is locked".into()),
        );

        let mapped: RelayError = InfraError::from(err).into();
        match mapped {
            RelayError::Database(msg) => assert!(msg.contains("busy")),
            other => panic!("expected database error, got {other:?}"),
        }
    }

    #[test]
    fn sqlite_no_rows_maps_to_not_found() {
        let mapped: RelayError = InfraError::from(SqlError::QueryReturnedNoRows).into();
        assert!(matches!(mapped, RelayError::NotFound(_)));
    }

    #[tokio::test]
    async fn http_status_401_maps_to_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(StatusCode::UNAUTHORIZED))
            .mount(&server)
            .await;

        let client = Client::builder().no_proxy().build().unwrap();
        let error = client.get(server.uri()).send().await.unwrap().error_for_status().unwrap_err();

        let mapped: RelayError = InfraError::from(error).into();
        match mapped {
            RelayError::Auth(msg) => assert!(msg.contains("401")),
            other => panic!("expected auth error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn http_connection_refused_maps_to_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = Client::builder().no_proxy().build().unwrap();
        let error = client.get(format!("http://{addr}")).send().await.unwrap_err();

        let mapped: RelayError = InfraError::from(error).into();
        assert!(matches!(mapped, RelayError::Network(_)), "got {mapped:?}");
    }
}
