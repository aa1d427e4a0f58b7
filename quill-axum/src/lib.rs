//! quill-axum: HTTP surface for the quill drafts subsystem.
//!
//! [`router`] wires every draft, upload, ledger and publish route over a
//! [`QuillState`]. Requests get an `x-request-id` (generated when absent and
//! echoed on the response) and are traced with `tower_http::trace`.
//!
//! The caller is whoever the gateway says it is: handlers read the user id
//! from the `x-user-id` header and answer 401 without it.

pub mod caller;
pub mod routes;
pub mod state;
pub mod validate;
mod error;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

pub use caller::Caller;
pub use error::QuillAxumError;
pub use state::QuillState;

pub use axum;

/// Full application router with request-id and tracing layers applied
pub fn router(state: QuillState) -> Router {
    let blob_limit = usize::try_from(state.drafts.config().max_file_bytes).unwrap_or(usize::MAX);
    routes::routes(blob_limit)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .with_state(state)
}
