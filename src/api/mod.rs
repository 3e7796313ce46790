// Remote collaborators of the dashboard controller
pub mod algo;
pub mod feed;

pub use algo::{AlgoApi, TradeRecord};
pub use feed::FeedApi;

use thiserror::Error;

/// Failure taxonomy at the remote boundary.
///
/// Transport failures and command rejections are never fatal to the
/// controller; callers log them and let the next reconciliation surface
/// whatever state resulted. Probe callers degrade to their safe default.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("request rejected with status {status}")]
    Rejected { status: reqwest::StatusCode },

    #[error("unparseable payload: {0}")]
    Payload(String),
}

/// Convert a non-success response into `ApiError::Rejected`
pub(crate) fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        Err(ApiError::Rejected { status })
    }
}
