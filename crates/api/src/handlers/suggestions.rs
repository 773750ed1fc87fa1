use axum::extract::Query;
use axum::Json;
use hrchat_core::context::ChatContext;
use hrchat_core::suggestions::{suggestions_for, SuggestionGroup};
use serde::Deserialize;

use crate::response::DataResponse;

#[derive(Debug, Deserialize)]
pub struct SuggestionsQuery {
    pub context: Option<String>,
}

/// GET /api/v1/chat/suggestions?context=vacation
///
/// Quick-start prompts for a context. Public and side-effect free; unknown
/// contexts get the `general` set.
pub async fn get_suggestions(
    Query(params): Query<SuggestionsQuery>,
) -> Json<DataResponse<Vec<SuggestionGroup>>> {
    let context = ChatContext::from_param(params.context.as_deref());
    Json(DataResponse {
        data: suggestions_for(context),
    })
}
