//! # ペルソナハンドラ
//!
//! 同梱カタログの読み取り専用エンドポイント。認証は不要。

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use wingman_domain::persona::{Gender, Persona, PersonaCatalog};
use wingman_shared::{ApiResponse, ErrorResponse};

use crate::error::{not_found_response, validation_error_response};

pub struct PersonaState {
    pub catalog: Arc<PersonaCatalog>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PersonaListQuery {
    /// 性別で絞り込む（`female` / `male`）
    pub gender: Option<String>,
}

/// ペルソナ
#[derive(Debug, Serialize, ToSchema)]
pub struct PersonaData {
    pub id:          String,
    pub name:        String,
    pub age:         u8,
    /// MBTI（例: `ENFP`）
    pub mbti:        String,
    pub job:         String,
    pub personality: Vec<String>,
    /// `female` または `male`
    pub gender:      String,
    /// 画像のパス
    pub image:       String,
}

impl From<&Persona> for PersonaData {
    fn from(persona: &Persona) -> Self {
        Self {
            id:          persona.id.clone(),
            name:        persona.name.clone(),
            age:         persona.age,
            mbti:        persona.mbti.to_string(),
            job:         persona.job.clone(),
            personality: persona.personality.clone(),
            gender:      persona.gender.to_string(),
            image:       persona.image.clone(),
        }
    }
}

/// GET /api/v1/personas
#[utoipa::path(
   get,
   path = "/api/v1/personas",
   tag = "personas",
   params(PersonaListQuery),
   responses(
      (status = 200, description = "ペルソナ一覧（カタログの定義順）", body = ApiResponse<Vec<PersonaData>>),
      (status = 400, description = "不正な gender", body = ErrorResponse)
   )
)]
#[tracing::instrument(skip_all)]
pub async fn list_personas(
    State(state): State<Arc<PersonaState>>,
    Query(query): Query<PersonaListQuery>,
) -> impl IntoResponse {
    let personas: Vec<PersonaData> = match query.gender.as_deref() {
        None | Some("") => state.catalog.all().iter().map(PersonaData::from).collect(),
        Some(gender) => {
            let Ok(gender) = gender.parse::<Gender>() else {
                return validation_error_response("gender は female または male を指定してください");
            };
            state
                .catalog
                .by_gender(gender)
                .into_iter()
                .map(PersonaData::from)
                .collect()
        }
    };

    Json(ApiResponse::new(personas)).into_response()
}

/// GET /api/v1/personas/{id}
#[utoipa::path(
   get,
   path = "/api/v1/personas/{id}",
   tag = "personas",
   params(("id" = String, Path, description = "ペルソナ ID")),
   responses(
      (status = 200, description = "ペルソナ", body = ApiResponse<PersonaData>),
      (status = 404, description = "未知の ID", body = ErrorResponse)
   )
)]
#[tracing::instrument(skip_all)]
pub async fn get_persona(
    State(state): State<Arc<PersonaState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.catalog.find(&id) {
        Some(persona) => Json(ApiResponse::new(PersonaData::from(persona))).into_response(),
        None => not_found_response("ペルソナが見つかりません"),
    }
}
