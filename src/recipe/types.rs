//! 食谱 API 类型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// === 错误响应 ===

/// API 错误响应
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<FieldError>,
}

/// 错误详情
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}

impl ErrorResponse {
    /// 创建新的错误响应
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                error_type: error_type.into(),
                message: message.into(),
            },
            details: Vec::new(),
        }
    }

    /// 创建认证错误响应
    pub fn authentication_error() -> Self {
        Self::new("authentication_error", "Could not validate API Key")
    }

    /// 创建请求体校验错误响应
    pub fn validation_error(details: Vec<FieldError>) -> Self {
        Self {
            details,
            ..Self::new("validation_error", "Request body failed validation")
        }
    }

    /// 创建上游失败响应（不包含任何上游细节）
    pub fn upstream_error() -> Self {
        Self::new("upstream_error", "recipe generation failed")
    }
}

/// 字段级校验错误
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

// === 请求类型 ===

/// 未给出份数（缺省或 null）时的默认值
const DEFAULT_SERVINGS: i64 = 2;

/// 简单查询：只有食材和份数
#[derive(Debug, Deserialize)]
pub struct SimpleRecipeRequest {
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub servings: Option<i64>,
}

/// 详细查询：额外包含饮食限制、菜系偏好和最长烹饪时间
#[derive(Debug, Deserialize)]
pub struct DetailedRecipeRequest {
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub servings: Option<i64>,
    #[serde(default)]
    pub dietary_restrictions: Option<Vec<String>>,
    #[serde(default)]
    pub cuisine_preference: Option<String>,
    /// 分钟
    #[serde(default)]
    pub cooking_time: Option<i64>,
}

/// 校验后的查询，Prompt Builder 的唯一输入
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeQuery {
    /// 非空，且每一项都已去除首尾空白
    pub ingredients: Vec<String>,
    pub servings: u32,
    /// 仅详细查询有
    pub preferences: Option<Preferences>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Preferences {
    /// 去重（不区分大小写，保留首次出现的顺序）
    pub dietary_restrictions: Vec<String>,
    pub cuisine_preference: Option<String>,
    /// 分钟
    pub max_cooking_time: Option<u32>,
}

/// 可以校验并转换为 [`RecipeQuery`] 的请求体
pub trait RecipeRequest: serde::de::DeserializeOwned {
    /// 日志中使用的端点类型
    const KIND: &'static str;

    fn into_query(self) -> Result<RecipeQuery, Vec<FieldError>>;
}

fn validate_ingredients(ingredients: Vec<String>, errors: &mut Vec<FieldError>) -> Vec<String> {
    if ingredients.is_empty() {
        errors.push(FieldError::new(
            "ingredients",
            "must contain at least one ingredient",
        ));
        return ingredients;
    }

    let mut cleaned = Vec::with_capacity(ingredients.len());
    for (i, item) in ingredients.into_iter().enumerate() {
        let trimmed = item.trim();
        if trimmed.is_empty() {
            errors.push(FieldError::new(
                format!("ingredients[{}]", i),
                "must not be blank",
            ));
        } else {
            cleaned.push(trimmed.to_string());
        }
    }
    cleaned
}

fn validate_positive(field: &str, value: i64, errors: &mut Vec<FieldError>) -> u32 {
    if value < 1 {
        errors.push(FieldError::new(field, "must be at least 1"));
        return 0;
    }
    match u32::try_from(value) {
        Ok(v) => v,
        Err(_) => {
            errors.push(FieldError::new(field, "is too large"));
            0
        }
    }
}

impl RecipeRequest for SimpleRecipeRequest {
    const KIND: &'static str = "simple";

    fn into_query(self) -> Result<RecipeQuery, Vec<FieldError>> {
        let mut errors = Vec::new();
        let ingredients = validate_ingredients(self.ingredients, &mut errors);
        let servings = validate_positive(
            "servings",
            self.servings.unwrap_or(DEFAULT_SERVINGS),
            &mut errors,
        );

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(RecipeQuery {
            ingredients,
            servings,
            preferences: None,
        })
    }
}

impl RecipeRequest for DetailedRecipeRequest {
    const KIND: &'static str = "detailed";

    fn into_query(self) -> Result<RecipeQuery, Vec<FieldError>> {
        let mut errors = Vec::new();
        let ingredients = validate_ingredients(self.ingredients, &mut errors);
        let servings = validate_positive(
            "servings",
            self.servings.unwrap_or(DEFAULT_SERVINGS),
            &mut errors,
        );
        let max_cooking_time = self
            .cooking_time
            .map(|t| validate_positive("cooking_time", t, &mut errors));

        if !errors.is_empty() {
            return Err(errors);
        }

        let mut dietary_restrictions: Vec<String> = Vec::new();
        for item in self.dietary_restrictions.unwrap_or_default() {
            let trimmed = item.trim();
            if trimmed.is_empty() {
                continue;
            }
            if !dietary_restrictions
                .iter()
                .any(|d| d.eq_ignore_ascii_case(trimmed))
            {
                dietary_restrictions.push(trimmed.to_string());
            }
        }

        let cuisine_preference = self
            .cuisine_preference
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        Ok(RecipeQuery {
            ingredients,
            servings,
            preferences: Some(Preferences {
                dietary_restrictions,
                cuisine_preference,
                max_cooking_time,
            }),
        })
    }
}

// === 响应类型 ===

/// 难度等级（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// 宽松解析模型给出的难度描述
    pub fn parse_lenient(text: &str) -> Option<Self> {
        let lower = text.trim().to_lowercase();
        const EASY: &[&str] = &["easy", "beginner", "simple", "mudah", "senang"];
        const MEDIUM: &[&str] = &["medium", "moderate", "intermediate", "sederhana", "average"];
        const HARD: &[&str] = &["hard", "difficult", "advanced", "challenging", "susah", "sukar"];

        // "not easy"、"tidak susah" 这类否定描述归为 Medium
        let found = |words: &[&str]| -> Option<bool> {
            words
                .iter()
                .filter_map(|w| lower.find(w))
                .map(|pos| is_negated(&lower[..pos]))
                .min()
        };
        match (found(HARD), found(MEDIUM), found(EASY)) {
            (Some(false), _, _) => Some(Difficulty::Hard),
            (_, Some(_), _) => Some(Difficulty::Medium),
            (_, _, Some(false)) => Some(Difficulty::Easy),
            (Some(true), _, _) | (_, _, Some(true)) => Some(Difficulty::Medium),
            _ => None,
        }
    }
}

/// 关键字前紧邻的一两个词中是否有否定词
fn is_negated(before: &str) -> bool {
    const NEGATIONS: &[&str] = &["not", "isn't", "never", "tidak", "bukan", "tak"];
    before
        .split_whitespace()
        .rev()
        .take(2)
        .any(|w| NEGATIONS.contains(&w))
}

/// 食谱响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeResponse {
    pub title: String,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub cooking_time: String,
    pub difficulty: Difficulty,
    pub notes: String,
    /// 服务端生成，从不取自模型输出
    pub timestamp: DateTime<Utc>,
}
