//! Response Shaper（非流式）
//!
//! 依次尝试三种解析方式：
//! 1. JSON：按 prompt 中约定的字段解析
//! 2. 分段文本：模型忽略 JSON 要求，改用 "Ingredients / Instructions" 小标题列表
//! 3. 原文兜底：原文放入 notes，不因模型格式问题让请求失败

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::types::{Difficulty, RecipeQuery, RecipeResponse};

/// 无法提取标题时的默认标题
pub const DEFAULT_TITLE: &str = "Chef's Surprise Recipe";
/// 模型未给出烹饪时间时的占位
pub const UNSPECIFIED_TIME: &str = "Not specified";
/// 原文兜底时唯一的步骤
pub const FALLBACK_INSTRUCTION: &str =
    "The chef got carried away: the full recipe is in the notes below.";

/// 实际命中的解析方式，仅用于日志
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeTier {
    Json,
    Sections,
    Fallback,
}

impl ShapeTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShapeTier::Json => "json",
            ShapeTier::Sections => "sections",
            ShapeTier::Fallback => "fallback",
        }
    }
}

/// 解析中间结果
#[derive(Debug, Default)]
struct Draft {
    title: String,
    ingredients: Vec<String>,
    instructions: Vec<String>,
    cooking_time: Option<String>,
    difficulty: Option<Difficulty>,
    notes: String,
}

impl Draft {
    fn is_complete(&self) -> bool {
        !self.title.trim().is_empty() && !self.ingredients.is_empty() && !self.instructions.is_empty()
    }

    fn finish(self, timestamp: DateTime<Utc>) -> RecipeResponse {
        RecipeResponse {
            title: self.title.trim().to_string(),
            ingredients: self.ingredients,
            instructions: self.instructions,
            cooking_time: self
                .cooking_time
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| UNSPECIFIED_TIME.to_string()),
            difficulty: self.difficulty.unwrap_or(Difficulty::Medium),
            notes: self.notes.trim().to_string(),
            timestamp,
        }
    }
}

/// 将模型原文整理为 [`RecipeResponse`]
///
/// 永不失败：任何格式偏差都会退化到原文兜底
pub fn shape(raw: &str, query: &RecipeQuery, timestamp: DateTime<Utc>) -> (RecipeResponse, ShapeTier) {
    if let Some(draft) = parse_json(raw).filter(Draft::is_complete) {
        return (draft.finish(timestamp), ShapeTier::Json);
    }
    if let Some(draft) = parse_sections(raw).filter(Draft::is_complete) {
        return (draft.finish(timestamp), ShapeTier::Sections);
    }
    (fallback(raw, query).finish(timestamp), ShapeTier::Fallback)
}

// === JSON ===

#[derive(Debug, Deserialize)]
struct ModelRecipe {
    #[serde(default)]
    title: Option<Value>,
    #[serde(default)]
    ingredients: Vec<Value>,
    #[serde(default, alias = "steps")]
    instructions: Vec<Value>,
    #[serde(default)]
    cooking_time: Option<Value>,
    #[serde(default)]
    difficulty: Option<String>,
    #[serde(default)]
    notes: Option<Value>,
}

/// 将任意 JSON 值压平成一行文本
///
/// 对象（如 `{"item": "rice", "amount": "1 cup"}`）按值的顺序拼接
fn flatten(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Object(map) => map
            .values()
            .filter_map(flatten)
            .collect::<Vec<_>>()
            .join(" "),
        Value::Array(items) => items.iter().filter_map(flatten).collect::<Vec<_>>().join(", "),
        Value::Bool(_) | Value::Null => String::new(),
    };
    (!text.is_empty()).then_some(text)
}

fn parse_json(raw: &str) -> Option<Draft> {
    // 取最外层的 {...}，顺带去掉 ```json 围栏和前后闲聊
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    let recipe: ModelRecipe = serde_json::from_str(&raw[start..=end]).ok()?;

    let cooking_time = match recipe.cooking_time {
        Some(Value::Number(n)) => Some(format!("{} minutes", n)),
        Some(other) => flatten(&other),
        None => None,
    };

    Some(Draft {
        title: recipe.title.as_ref().and_then(flatten).unwrap_or_default(),
        ingredients: recipe.ingredients.iter().filter_map(flatten).collect(),
        instructions: recipe.instructions.iter().filter_map(flatten).collect(),
        cooking_time,
        difficulty: recipe.difficulty.as_deref().and_then(Difficulty::parse_lenient),
        notes: recipe.notes.as_ref().and_then(flatten).unwrap_or_default(),
    })
}

// === 分段文本 ===

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Title,
    Ingredients,
    Instructions,
    CookingTime,
    Difficulty,
    Notes,
}

/// 小标题关键字（小写前缀）
const HEADINGS: &[(&str, Section)] = &[
    ("title", Section::Title),
    ("recipe name", Section::Title),
    ("nama resepi", Section::Title),
    ("ingredient", Section::Ingredients),
    ("complete ingredient", Section::Ingredients),
    ("bahan", Section::Ingredients),
    ("instruction", Section::Instructions),
    ("step-by-step", Section::Instructions),
    ("steps", Section::Instructions),
    ("method", Section::Instructions),
    ("direction", Section::Instructions),
    ("cara", Section::Instructions),
    ("langkah", Section::Instructions),
    ("cooking time", Section::CookingTime),
    ("total time", Section::CookingTime),
    ("time", Section::CookingTime),
    ("masa", Section::CookingTime),
    ("difficulty", Section::Difficulty),
    ("tahap", Section::Difficulty),
    ("note", Section::Notes),
    ("tip", Section::Notes),
    ("nota", Section::Notes),
];

/// 去掉 Markdown 标记（#、*、_）以及列表符号
fn strip_markup(line: &str) -> &str {
    line.trim()
        .trim_start_matches(|c: char| c == '#' || c == '-' || c == '•' || c.is_whitespace())
        .trim_matches(|c: char| c == '*' || c == '_')
        .trim()
}

/// 去掉行首的列表符号或序号（"- "、"* "、"1. "、"2) "、"Step 3:"）
fn strip_item_marker(line: &str) -> &str {
    let line = line.trim();
    let line = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .or_else(|| line.strip_prefix("• "))
        .unwrap_or(line);

    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return rest.trim();
        }
    }

    let lower = line.to_lowercase();
    if lower.starts_with("step ") {
        if let Some(pos) = line.find(':') {
            let label = &line[5..pos];
            if !label.is_empty() && label.trim().chars().all(|c| c.is_ascii_digit()) {
                return line[pos + 1..].trim();
            }
        }
    }
    line.trim_matches(|c: char| c == '*' || c == '_').trim()
}

/// 是否为列表项（"- "、"* "、"• " 或 "1." / "2)" 开头）
fn is_list_item(line: &str) -> bool {
    let line = line.trim_start();
    if line.starts_with("- ") || line.starts_with("* ") || line.starts_with("• ") {
        return true;
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    digits > 0 && matches!(line[digits..].chars().next(), Some('.') | Some(')'))
}

/// 标签以完整的关键字开头（允许复数 s），"caraway" 不匹配 "cara"
fn starts_with_keyword(label: &str, keyword: &str) -> bool {
    let Some(rest) = label.strip_prefix(keyword) else {
        return false;
    };
    let rest = rest.strip_prefix('s').unwrap_or(rest);
    !rest.starts_with(char::is_alphanumeric)
}

/// 判断一行是否为小标题，返回所属分段和同一行中冒号后的内容
///
/// 无冒号时整行必须等于关键字（允许复数 s 和 "list"/"level" 后缀）；
/// 有冒号时冒号前的部分以完整关键字开头且不超过 4 个词
fn classify_heading(line: &str) -> Option<(Section, Option<String>)> {
    let cleaned = strip_markup(line);
    let (label, inline) = match cleaned.find(':') {
        Some(pos) => (&cleaned[..pos], Some(cleaned[pos + 1..].trim())),
        None => (cleaned, None),
    };
    let label = label.trim_matches(|c: char| c == '*' || c == '_').trim().to_lowercase();
    if label.is_empty() || label.split_whitespace().count() > 4 {
        return None;
    }

    for (keyword, section) in HEADINGS {
        let matched = match inline {
            Some(_) => starts_with_keyword(&label, keyword),
            None => {
                let base = label
                    .trim_end_matches(" list")
                    .trim_end_matches(" level")
                    .trim_end_matches('s');
                base == keyword.trim_end_matches('s')
            }
        };
        if matched {
            let inline = inline
                .map(|s| s.trim_matches(|c: char| c == '*' || c == '_').trim().to_string())
                .filter(|s| !s.is_empty());
            return Some((*section, inline));
        }
    }
    None
}

fn parse_sections(raw: &str) -> Option<Draft> {
    let mut draft = Draft::default();
    let mut notes: Vec<String> = Vec::new();
    let mut preamble: Vec<String> = Vec::new();
    let mut current = Section::Preamble;
    let mut saw_heading = false;

    for line in raw.lines() {
        if line.trim().is_empty() {
            continue;
        }

        // 食材和步骤列表中的条目本身可能带冒号（"- Masala: 1 tsp"），不作为小标题
        let in_list = matches!(current, Section::Ingredients | Section::Instructions);
        let heading = if in_list && is_list_item(line) {
            None
        } else {
            classify_heading(line)
        };

        if let Some((section, inline)) = heading {
            saw_heading = true;
            current = section;
            if let Some(value) = inline {
                match section {
                    Section::Title => draft.title = value,
                    Section::CookingTime => draft.cooking_time = Some(value),
                    Section::Difficulty => draft.difficulty = Difficulty::parse_lenient(&value),
                    Section::Notes => notes.push(value),
                    Section::Ingredients => draft.ingredients.push(value),
                    Section::Instructions => draft.instructions.push(value),
                    Section::Preamble => {}
                }
            }
            continue;
        }

        let item = strip_item_marker(line);
        if item.is_empty() {
            continue;
        }
        match current {
            Section::Preamble => preamble.push(item.to_string()),
            Section::Title => {
                if draft.title.is_empty() {
                    draft.title = item.to_string();
                } else {
                    notes.push(item.to_string());
                }
            }
            Section::Ingredients => draft.ingredients.push(item.to_string()),
            Section::Instructions => draft.instructions.push(item.to_string()),
            Section::CookingTime => match draft.cooking_time {
                None => draft.cooking_time = Some(item.to_string()),
                Some(_) => notes.push(item.to_string()),
            },
            Section::Difficulty => {
                if draft.difficulty.is_none() {
                    draft.difficulty = Difficulty::parse_lenient(item);
                } else {
                    notes.push(item.to_string());
                }
            }
            Section::Notes => notes.push(item.to_string()),
        }
    }

    if !saw_heading {
        return None;
    }

    // 没有 Title 小标题时，取开场白第一行作为标题，其余并入 notes
    let mut preamble = preamble.into_iter();
    if draft.title.is_empty() {
        draft.title = preamble.next().map(|l| clean_title(&l)).unwrap_or_default();
    }
    let mut all_notes: Vec<String> = preamble.collect();
    all_notes.extend(notes);
    draft.notes = all_notes.join("\n");

    Some(draft)
}

// === 原文兜底 ===

fn clean_title(line: &str) -> String {
    let cleaned = strip_markup(line);
    let cleaned = cleaned
        .strip_prefix("Title:")
        .or_else(|| cleaned.strip_prefix("title:"))
        .unwrap_or(cleaned);
    cleaned.trim_matches(|c: char| c == '*' || c == '_').trim().to_string()
}

/// 第一行非空且不以 '-' 开头的内容作为标题
fn extract_title(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('-'))
        .map(clean_title)
        .filter(|t| !t.is_empty() && !t.starts_with('{'))
        .unwrap_or_else(|| DEFAULT_TITLE.to_string())
}

fn fallback(raw: &str, query: &RecipeQuery) -> Draft {
    let cooking_time = query
        .preferences
        .as_ref()
        .and_then(|p| p.max_cooking_time)
        .map(|m| format!("up to {} minutes", m));

    Draft {
        title: extract_title(raw),
        ingredients: query.ingredients.clone(),
        instructions: vec![FALLBACK_INSTRUCTION.to_string()],
        cooking_time,
        difficulty: None,
        notes: raw.to_string(),
    }
}
