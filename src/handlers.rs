use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Response},
    Json,
};
use std::collections::BTreeMap;
use tracing::info;

use crate::{
    catalog::{find_language, LANGUAGES},
    error::AppError,
    models::{
        ConvertRequest, HealthResponse, LanguageInfo, LanguagesResponse, VoicesQuery,
        VoicesResponse,
    },
    state::AppState,
};

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        message: "Text to Audio API is running",
    })
}

pub async fn languages() -> Json<LanguagesResponse> {
    Json(LanguagesResponse {
        languages: LANGUAGES
            .iter()
            .map(|language| LanguageInfo {
                code: language.code,
                name: language.name,
            })
            .collect(),
    })
}

pub async fn voices(Query(query): Query<VoicesQuery>) -> Result<Json<VoicesResponse>, AppError> {
    let voices = match query.language.as_deref() {
        Some(code) => {
            let language = find_language(code).ok_or_else(|| {
                AppError::bad_request(format!("Language code '{code}' not found"))
            })?;
            BTreeMap::from([(language.code, language.voices)])
        }
        None => LANGUAGES
            .iter()
            .map(|language| (language.code, language.voices))
            .collect(),
    };

    Ok(Json(VoicesResponse { voices }))
}

pub async fn convert(
    State(state): State<AppState>,
    payload: Result<Json<ConvertRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) =
        payload.map_err(|rejection| AppError::new(rejection.status(), rejection.body_text()))?;
    let path = state.tts.synthesize(&request).await?;
    let audio = tokio::fs::read(&path).await?;
    info!(
        language = %request.language,
        chars = request.text.chars().count(),
        bytes = audio.len(),
        "synthesized {}",
        path.display()
    );

    Ok((
        [
            (CONTENT_TYPE, "audio/mpeg"),
            (CONTENT_DISPOSITION, "attachment; filename=\"speech.mp3\""),
        ],
        audio,
    )
        .into_response())
}
