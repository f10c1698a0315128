use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use cp_order_engine::{NotificationApiError, OrderFlowError, PaymentApiError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("The request conflicts with the current state of the order. {0}")]
    Conflict(String),
    #[error("Payment verification failed. {0}")]
    PaymentVerificationFailed(String),
    #[error("The payment provider could not complete the request. {0}")]
    PaymentProviderError(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingToken => StatusCode::UNAUTHORIZED,
                AuthError::ValidationError(_) => StatusCode::UNAUTHORIZED,
                AuthError::PoorlyFormattedToken(_) => StatusCode::UNAUTHORIZED,
                AuthError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            },
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PaymentVerificationFailed(_) => StatusCode::BAD_REQUEST,
            Self::PaymentProviderError(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No access token was provided.")]
    MissingToken,
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("Access token is invalid. {0}")]
    ValidationError(String),
    #[error("Access token is not in the correct format. {0}")]
    PoorlyFormattedToken(String),
}

impl From<OrderFlowError> for ServerError {
    fn from(e: OrderFlowError) -> Self {
        match e {
            OrderFlowError::StorageError(_) => Self::BackendError(e.to_string()),
            OrderFlowError::OrderNotFound(_) => Self::NoRecordFound(e.to_string()),
            OrderFlowError::InvalidOrder(_) | OrderFlowError::MissingReason => Self::InvalidRequestBody(e.to_string()),
            OrderFlowError::InvalidTransition(..) | OrderFlowError::OrderImmutable(..) | OrderFlowError::NoOp(..) => {
                Self::Conflict(e.to_string())
            },
        }
    }
}

impl From<PaymentApiError> for ServerError {
    fn from(e: PaymentApiError) -> Self {
        match e {
            PaymentApiError::StorageError(_) => Self::BackendError(e.to_string()),
            PaymentApiError::OrderNotFound(_) | PaymentApiError::IntentNotFound(_) => Self::NoRecordFound(e.to_string()),
            PaymentApiError::AmountMismatch { .. } => Self::InvalidRequestBody(e.to_string()),
            PaymentApiError::AlreadyPaid(_) | PaymentApiError::OrderNotPayable(..) | PaymentApiError::IntentNotLive(_) => {
                Self::Conflict(e.to_string())
            },
            PaymentApiError::InvalidSignature => Self::PaymentVerificationFailed(e.to_string()),
            PaymentApiError::ProviderError(_) => Self::PaymentProviderError(e.to_string()),
        }
    }
}

impl From<NotificationApiError> for ServerError {
    fn from(e: NotificationApiError) -> Self {
        match e {
            NotificationApiError::StorageError(_) => Self::BackendError(e.to_string()),
            NotificationApiError::NotificationNotFound(_) => Self::NoRecordFound(e.to_string()),
        }
    }
}
