use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use color_eyre::eyre;

pub type Result<T, E = Report> = color_eyre::Result<T, E>;

/// Error returned from bridge handlers. Logs the full report and answers with a 500.
pub struct Report(eyre::Report);

impl std::fmt::Debug for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl<E> From<E> for Report
where
    E: Into<eyre::Report>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for Report {
    fn into_response(self) -> Response {
        let err = self.0;
        tracing::error!("Bridge request failed: {err:?}");
        (StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}")).into_response()
    }
}
