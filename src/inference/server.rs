use super::SuggestionService;
use crate::git::extractor::recent_subjects;
use crate::model::Seq2SeqModel;
use crate::types::{ErrorResponse, SuggestRequest, SuggestResponse};
use serde_json::json;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use warp::Filter;
use warp::http::StatusCode;

/// Largest accepted request body
const MAX_BODY_BYTES: u64 = 4 * 1024 * 1024;

/// Shared state behind the HTTP routes
pub struct ServerState<M> {
    pub service: SuggestionService<M>,
    /// How many subjects to read when a request names a local repository
    pub context_commits: usize,
}

/// `POST /suggest` and `GET /health`
pub fn routes<M>(
    state: Arc<ServerState<M>>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone
where
    M: Seq2SeqModel + Send + Sync + 'static,
{
    let state_filter = warp::any().map(move || Arc::clone(&state));

    let suggest = warp::path("suggest")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(state_filter)
        .and_then(suggest_handler::<M>);

    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| {
            warp::reply::json(&json!({
                "status": "ok",
                "version": env!("CARGO_PKG_VERSION"),
            }))
        });

    suggest.or(health)
}

/// Bind and serve until the process is stopped
pub async fn serve<M>(state: Arc<ServerState<M>>, addr: SocketAddr)
where
    M: Seq2SeqModel + Send + Sync + 'static,
{
    tracing::info!("Suggestion server listening on http://{}", addr);
    warp::serve(routes(state)).run(addr).await;
}

async fn suggest_handler<M>(
    request: SuggestRequest,
    state: Arc<ServerState<M>>,
) -> Result<impl warp::Reply, Infallible>
where
    M: Seq2SeqModel + Send + Sync + 'static,
{
    if request.diff.trim().is_empty() {
        return Ok(error_reply("No diff provided", StatusCode::BAD_REQUEST));
    }

    let result = tokio::task::spawn_blocking(move || {
        let mut context = request.repo_context;
        if let Some(repo_path) = request.repo_path.as_deref()
            && context.is_empty()
        {
            context = recent_subjects(repo_path, state.context_commits);
        }
        state
            .service
            .suggest(&request.diff, &context, request.num_return_sequences)
    })
    .await;

    match result {
        Ok(Ok(suggestions)) => Ok(warp::reply::with_status(
            warp::reply::json(&SuggestResponse { suggestions }),
            StatusCode::OK,
        )),
        Ok(Err(e)) => {
            tracing::error!("Suggestion failed: {}", e);
            Ok(error_reply(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR))
        }
        Err(e) => {
            tracing::error!("Suggestion task panicked: {}", e);
            Ok(error_reply(
                "Suggestion task failed",
                StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}

fn error_reply(message: &str, status: StatusCode) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(
        warp::reply::json(&ErrorResponse {
            error: message.to_string(),
        }),
        status,
    )
}
