use crate::config::ConfigError;
use crate::costing::CostingError;
use crate::engine::{ConfigurationErrors, ResolutionError};
use crate::store::{CatalogError, StoreError};
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Catalog(CatalogError),
    Configuration(ConfigurationErrors),
    Resolution(ResolutionError),
    Costing(CostingError),
    Store(StoreError),
    NotFound(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Configuration(_)
            | AppError::Costing(CostingError::Overflow { .. })
            | AppError::Costing(CostingError::PerUnitOverflow { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Resolution(err) => resolution_status(err),
            AppError::Costing(CostingError::Resolution(err)) => resolution_status(err),
            AppError::Costing(CostingError::UnknownProduct { .. }) | AppError::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            AppError::Costing(CostingError::Cache(_)) | AppError::Store(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Catalog(_) => StatusCode::BAD_REQUEST,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn resolution_status(err: &ResolutionError) -> StatusCode {
    match err {
        ResolutionError::UnknownProductType(_) => StatusCode::NOT_FOUND,
        ResolutionError::InactiveProductType(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ResolutionError::DataUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Catalog(err) => write!(f, "catalog error: {}", err),
            AppError::Configuration(err) => write!(f, "{}", err),
            AppError::Resolution(err) => write!(f, "resolution error: {}", err),
            AppError::Costing(err) => write!(f, "labor costing error: {}", err),
            AppError::Store(err) => write!(f, "{}", err),
            AppError::NotFound(what) => write!(f, "not found: {}", what),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Catalog(err) => Some(err),
            AppError::Configuration(err) => Some(err),
            AppError::Resolution(err) => Some(err),
            AppError::Costing(err) => Some(err),
            AppError::Store(err) => Some(err),
            AppError::NotFound(_) => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::Configuration(errors) => Json(json!({
                "error": self.to_string(),
                "issues": errors.0.iter().map(ToString::to_string).collect::<Vec<_>>(),
            })),
            _ => Json(json!({ "error": self.to_string() })),
        };
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<CatalogError> for AppError {
    fn from(value: CatalogError) -> Self {
        Self::Catalog(value)
    }
}

impl From<ConfigurationErrors> for AppError {
    fn from(value: ConfigurationErrors) -> Self {
        Self::Configuration(value)
    }
}

impl From<ResolutionError> for AppError {
    fn from(value: ResolutionError) -> Self {
        Self::Resolution(value)
    }
}

impl From<CostingError> for AppError {
    fn from(value: CostingError) -> Self {
        Self::Costing(value)
    }
}

impl From<StoreError> for AppError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}
