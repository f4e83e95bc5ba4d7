use thiserror::Error;

#[derive(Error, Debug)]
pub enum AtlasError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("Backend returned HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Page {page} is out of range (total pages: {total_pages})")]
    PageOutOfRange { page: usize, total_pages: usize },

    #[error("Invalid filter: {message}")]
    InvalidFilter { message: String },

    #[error("Unknown cluster id: {0}")]
    UnknownCluster(u64),

    #[error("Unknown listing: {0}")]
    UnknownListing(String),

    #[error("Invalid review: {message}")]
    InvalidReview { message: String },

    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Current role is not allowed to {action}")]
    Forbidden { action: String },
}

/// 錯誤分類，CLI 依此決定退出碼
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Configuration,
    Input,
    Authentication,
    Internal,
}

impl AtlasError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            AtlasError::ApiError(_) | AtlasError::HttpStatus { .. } => ErrorCategory::Network,
            AtlasError::ConfigError { .. }
            | AtlasError::ConfigValidationError { .. }
            | AtlasError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            AtlasError::PageOutOfRange { .. }
            | AtlasError::InvalidFilter { .. }
            | AtlasError::UnknownCluster(_)
            | AtlasError::UnknownListing(_)
            | AtlasError::InvalidReview { .. } => ErrorCategory::Input,
            AtlasError::Unauthenticated | AtlasError::Forbidden { .. } => {
                ErrorCategory::Authentication
            }
            AtlasError::IoError(_) => ErrorCategory::Internal,
        }
    }

    /// 401/403 視為未登入
    pub fn is_auth_failure(&self) -> bool {
        match self {
            AtlasError::Unauthenticated => true,
            AtlasError::HttpStatus { status, .. } => *status == 401 || *status == 403,
            _ => false,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Could not reach the listings backend: {}", self),
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Input => format!("Invalid request: {}", self),
            ErrorCategory::Authentication => match self {
                AtlasError::Forbidden { .. } => self.to_string(),
                _ => "Please log in and try again".to_string(),
            },
            ErrorCategory::Internal => format!("Unexpected error: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, AtlasError>;
