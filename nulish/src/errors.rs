use std::sync::{Arc, OnceLock};

use crate::error_responses;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Request,
    },
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use schemars::{
    schema::{Schema, SchemaObject, SubschemaValidation},
    schema_for, JsonSchema,
};
use serde::Serialize;
use serde_json::Value;

use crate::ctx::current_request_id;

pub use response::{ErrorResponse, ErrorResponseDocs};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("not_found")]
    NotFound(String),

    #[error("missing parameter {0}")]
    MissingParameter(String),

    // validation
    #[error("validation")]
    JsonValidation(#[from] JsonRejection),
    #[error("validation")]
    QueryValidation(#[from] QueryRejection),
    #[error("validation")]
    PathValidation(#[from] PathRejection),

    #[error(transparent)]
    Store(crate::store::Error),

    #[error(transparent)]
    Config(#[from] envy::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("unexpected: {0}")]
    Unexpected(String),
}

impl From<crate::store::Error> for Error {
    fn from(error: crate::store::Error) -> Self {
        match error {
            crate::store::Error::DB(crate::db::Error::NotFound(msg)) => Self::NotFound(msg),
            error => Self::Store(error),
        }
    }
}

impl From<crate::db::Error> for Error {
    fn from(error: crate::db::Error) -> Self {
        crate::store::Error::from(error).into()
    }
}

// Response

error_responses! {
    not_found: 404,
    missing_parameter: 400,
    path_validation: 400,
    query_validation: 400,
    json_validation: 400,
    unexpected: 500
}

impl From<&Error> for ErrorResponse {
    fn from(error: &Error) -> Self {
        let errors = errors();
        match error {
            Error::NotFound(message) => errors.not_found.with_message(message),
            Error::MissingParameter(name) => errors.missing_parameter.with_message(format!("Missing {name}")),
            Error::JsonValidation(error) => errors.json_validation.with_message(error.body_text()),
            Error::QueryValidation(error) => errors.query_validation.with_message(error.body_text()),
            Error::PathValidation(error) => errors.path_validation.with_message(error.body_text()),
            Error::Store(error) => errors.unexpected.with_message(error.to_string()),
            Error::Unexpected(message) => errors.unexpected.with_message(message),
            _ => errors.unexpected.with_message("Unexpected"),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let error = Arc::new(self);

        let error_res = ErrorResponse::from(error.as_ref());
        let status = error_res.status;

        let mut res = axum::Json(error_res).into_response();
        res.extensions_mut().insert(error);

        *res.status_mut() = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        res
    }
}

pub async fn on_error(request: Request, next: Next) -> Response {
    let response = next.run(request).await;

    let error = response.extensions().get::<Arc<Error>>().map(Arc::as_ref);
    if let Some(error) = error {
        let request_id = current_request_id().unwrap_or_default();
        if response.status().is_server_error() {
            tracing::error!(request_id = %request_id, "{:?}", error);
        } else {
            tracing::debug!(request_id = %request_id, "{:?}", error);
        }
    }

    response
}

mod response {
    use serde_json::Map;

    use super::*;

    #[derive(Debug, Serialize, Clone, Default, JsonSchema)]
    pub struct ErrorResponse {
        pub error: String,
        pub message: Option<String>,
        pub status: u16,
        pub details: Option<Map<String, Value>>,
    }

    impl ErrorResponse {
        pub fn new(error: impl Into<String>, status: u16) -> Self {
            Self {
                error: error.into(),
                status,
                ..Default::default()
            }
        }

        pub fn with_message(&self, message: impl Into<String>) -> Self {
            let mut res = self.clone();
            res.message = Some(message.into());
            res
        }
    }

    pub struct ErrorResponseDocs;

    impl JsonSchema for ErrorResponseDocs {
        fn schema_name() -> String {
            String::from("ErrorResponse")
        }

        fn json_schema(_gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
            let error_schemas = errors()
                .all()
                .into_iter()
                .map(|example| {
                    let mut schema = schema_for!(ErrorResponse).schema;
                    let obj = schema.object();
                    if let Some(Schema::Object(status)) = obj.properties.get_mut("status") {
                        status.enum_values = Some(vec![Value::from(example.status)]);
                    }
                    if let Some(Schema::Object(error)) = obj.properties.get_mut("error") {
                        error.enum_values = Some(vec![Value::from(example.error.clone())]);
                    }

                    Schema::from(schema)
                })
                .collect::<Vec<_>>();

            let schema = SchemaObject {
                subschemas: Some(Box::new(SubschemaValidation {
                    one_of: Some(error_schemas),
                    ..Default::default()
                })),
                ..Default::default()
            };

            schema.into()
        }
    }

    /// Typed responses with a custom JSON schema
    /// ```rust
    /// error_responses! {
    ///     not_found: 404,
    ///     unexpected: 500
    /// }
    ///
    /// impl From<&Error> for ErrorResponse {
    ///     fn from(error: &Error) -> Self {
    ///     let errors = errors(); // <- from macro
    ///     match error {
    ///         Error::NotFound(message) => errors.not_found.with_message(message),
    ///         Error::Unexpected(message) => errors.unexpected.with_message(message),
    ///     }
    /// }
    /// ```
    #[macro_export]
    macro_rules! error_responses {
        (
            $($name:ident: $code:expr),* $(,)?
        ) => {
            #[derive(Debug, Clone, Serialize)]
            struct Responses {
                $(
                    $name: ErrorResponse,
                )*
            }

            impl Responses {
                fn all(&self) -> Vec<&ErrorResponse> {
                    vec![$(&self.$name),*]
                }
            }

            static ERRORS: OnceLock<Responses> = OnceLock::new();

            fn errors() -> &'static Responses {
                ERRORS.get_or_init(|| Responses {
                    $(
                        $name: ErrorResponse::new(stringify!($name), $code),
                    )*
                })
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let status = |error: Error| ErrorResponse::from(&error).status;

        assert_eq!(status(Error::NotFound("x".into())), 404);
        assert_eq!(status(Error::MissingParameter("id".into())), 400);
        assert_eq!(status(Error::Store(crate::store::Error::Unavailable("down".into()))), 500);
    }

    #[test]
    fn test_db_not_found_maps_to_not_found() {
        let error = Error::from(crate::db::Error::NotFound("Note not found".into()));
        assert!(matches!(error, Error::NotFound(message) if message == "Note not found"));
    }
}
