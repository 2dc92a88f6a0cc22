//! # ユーザー
//!
//! 認証済みユーザーの識別子と、外部データベースの `profiles` テーブルに
//! 保存されるプロフィールを定義する。
//!
//! ## ドメイン用語
//!
//! | 型 | ドメイン用語 | 備考 |
//! |---|------------|------|
//! | [`UserId`] | ユーザー ID | 認証サービスが採番する UUID |
//! | [`Email`] | メールアドレス | 最大 254 文字 |
//! | [`Mbti`] | MBTI タイプ | 16 種類 |
//! | [`MemberTier`] | 会員区分 | 未知の値は `free` に丸める |
//! | [`UserProfile`] | プロフィール | テーブルの 1 行 |
//! | [`ProfileUpdate`] | プロフィール更新 | 部分更新 |

use serde::{Deserialize, Deserializer, Serialize};
use strum::IntoStaticStr;

use crate::DomainError;

define_uuid_id! {
    /// ユーザー ID
    ///
    /// 認証サービスが発行する UUID をそのまま保持する。
    pub struct UserId { label: "ユーザー ID" }
}

/// メールアドレス（値オブジェクト）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// 最大文字数
    pub const MAX_LENGTH: usize = 254;

    /// メールアドレスを作成する
    ///
    /// # バリデーション
    ///
    /// - 前後の空白を除去して空文字列ではない
    /// - `local@domain` の形式である
    /// - 最大 254 文字
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into().trim().to_string();

        if value.is_empty() {
            return Err(DomainError::Validation(
                "メールアドレスは必須です".to_string(),
            ));
        }

        let Some((local, domain)) = value.split_once('@') else {
            return Err(DomainError::Validation(
                "メールアドレスの形式が不正です".to_string(),
            ));
        };

        if local.is_empty() || domain.is_empty() {
            return Err(DomainError::Validation(
                "メールアドレスの形式が不正です".to_string(),
            ));
        }

        if value.chars().count() > Self::MAX_LENGTH {
            return Err(DomainError::Validation(format!(
                "メールアドレスは{}文字以内である必要があります",
                Self::MAX_LENGTH
            )));
        }

        Ok(Self(value))
    }

    /// 文字列参照を取得する
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 所有権を持つ文字列に変換する
    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for Email {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Email> for String {
    fn from(value: Email) -> Self {
        value.0
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

define_validated_string! {
    /// 表示名（最大 50 文字）
    pub struct UserName {
        label: "名前",
        max_length: 50,
    }
}

/// MBTI タイプ
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    IntoStaticStr,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Mbti {
    Intj,
    Intp,
    Entj,
    Entp,
    Infj,
    Infp,
    Enfj,
    Enfp,
    Istj,
    Isfj,
    Estj,
    Esfj,
    Istp,
    Isfp,
    Estp,
    Esfp,
}

/// 会員区分
///
/// データベース上の未知の値や欠損値は [`MemberTier::Free`] として扱う。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MemberTier {
    #[default]
    Free,
    Basic,
    Premium,
}

impl MemberTier {
    /// ワイヤー上の値を寛容にパースする
    pub fn from_wire(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("basic") => Self::Basic,
            Some("premium") => Self::Premium,
            _ => Self::Free,
        }
    }
}

impl<'de> Deserialize<'de> for MemberTier {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(Self::from_wire(value.as_deref()))
    }
}

/// 不正な MBTI 文字列を `None` として読み込む
fn deserialize_lenient_mbti<'de, D>(deserializer: D) -> Result<Option<Mbti>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.and_then(|v| v.parse().ok()))
}

/// ユーザープロフィール（`profiles` テーブルの 1 行）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id:              UserId,
    #[serde(default)]
    pub name:            Option<String>,
    #[serde(default)]
    pub email:           Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_mbti")]
    pub mbti:            Option<Mbti>,
    #[serde(default)]
    pub member_tier:     MemberTier,
    #[serde(default)]
    pub cam_calibration: Option<serde_json::Value>,
}

/// プロフィールの部分更新
///
/// 指定されたフィールドのみを更新する。`name` は指定された場合のみ検証される。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name:            Option<UserName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mbti:            Option<Mbti>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cam_calibration: Option<serde_json::Value>,
}

impl ProfileUpdate {
    /// 更新対象のフィールドが 1 つもないか
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.mbti.is_none() && self.cam_calibration.is_none()
    }
}
