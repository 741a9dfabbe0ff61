/// Errors from downstream provider calls.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ApiError {
    #[error("No API key available in context or environment")]
    MissingCredential,
    #[error("ScreenshotOne access key is not configured")]
    MissingAccessKey,
    #[error("failed to build HTTP client: {0}")]
    Build(String),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    /// The provider answered 2xx but flagged the request as failed.
    #[error("provider rejected request: {0}")]
    Rejected(String),
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::MissingAccessKey => "missing_access_key",
            Self::Build(_) => "build",
            Self::Transport(_) => "transport",
            Self::Status { status, .. } => match AuthFailure::from_status(*status) {
                Some(AuthFailure::Authentication) => "authentication_failed",
                Some(AuthFailure::Authorization) => "authorization_failed",
                None => "http_status",
            },
            Self::Rejected(_) => "rejected",
            Self::Decode(_) => "decode",
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else if e.is_builder() {
            Self::Build(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

impl From<ApiError> for vidcap_core::tools::ToolError {
    fn from(e: ApiError) -> Self {
        Self::Api {
            kind: e.error_kind(),
            message: e.to_string(),
        }
    }
}

/// Credential problems a provider can signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthFailure {
    /// 401: the credential was rejected.
    Authentication,
    /// 403: the credential is valid but lacks permission.
    Authorization,
}

impl AuthFailure {
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            401 => Some(Self::Authentication),
            403 => Some(Self::Authorization),
            _ => None,
        }
    }
}
