//! # ペルソナカタログ
//!
//! 会話練習の相手として選択できるペルソナの静的カタログ。
//! クレートに同梱した JSON を起動時に 1 度だけ読み込み、以降は変更しない。

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::{DomainError, user::Mbti};

const BUNDLED_PERSONAS: &str = include_str!("../data/personas.json");

/// 成人年齢（カタログに含められる最小年齢）
pub const MIN_PERSONA_AGE: u8 = 18;

/// ペルソナの性別
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    IntoStaticStr,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Gender {
    Female,
    Male,
}

/// ペルソナ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub id:          String,
    pub name:        String,
    pub age:         u8,
    pub mbti:        Mbti,
    pub job:         String,
    pub personality: Vec<String>,
    pub gender:      Gender,
    pub image:       String,
}

/// ペルソナカタログ
#[derive(Debug, Clone)]
pub struct PersonaCatalog {
    personas: Vec<Persona>,
}

impl PersonaCatalog {
    /// 同梱のカタログを読み込む
    pub fn bundled() -> Result<Self, DomainError> {
        Self::from_json(BUNDLED_PERSONAS)
    }

    /// JSON 配列からカタログを構築する
    ///
    /// # エラー
    ///
    /// 以下のいずれかに該当する場合は `DomainError::Validation` を返す。
    ///
    /// - JSON として解釈できない
    /// - ID が重複している
    /// - 年齢が 18 歳未満
    /// - 性格タグが空
    pub fn from_json(json: &str) -> Result<Self, DomainError> {
        let personas: Vec<Persona> = serde_json::from_str(json).map_err(|e| {
            DomainError::Validation(format!("ペルソナカタログを解析できません: {e}"))
        })?;
        Self::new(personas)
    }

    pub fn new(personas: Vec<Persona>) -> Result<Self, DomainError> {
        let mut seen = HashSet::new();

        for persona in &personas {
            if !seen.insert(persona.id.as_str()) {
                return Err(DomainError::Validation(format!(
                    "ペルソナ ID が重複しています: {}",
                    persona.id
                )));
            }
            if persona.age < MIN_PERSONA_AGE {
                return Err(DomainError::Validation(format!(
                    "ペルソナ {} の年齢は {} 歳以上である必要があります",
                    persona.id, MIN_PERSONA_AGE
                )));
            }
            if persona.personality.is_empty() {
                return Err(DomainError::Validation(format!(
                    "ペルソナ {} の性格タグが空です",
                    persona.id
                )));
            }
        }

        Ok(Self { personas })
    }

    /// 全ペルソナを定義順に返す
    pub fn all(&self) -> &[Persona] {
        &self.personas
    }

    pub fn find(&self, id: &str) -> Option<&Persona> {
        self.personas.iter().find(|p| p.id == id)
    }

    pub fn by_gender(&self, gender: Gender) -> Vec<&Persona> {
        self.personas.iter().filter(|p| p.gender == gender).collect()
    }
}
