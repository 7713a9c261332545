//! Prompt 构建
//!
//! 同一个 [`RecipeQuery`] 在流式与非流式端点下生成完全相同的 prompt。

use super::types::RecipeQuery;

/// 角色设定：搞笑但靠谱的大厨
const PERSONA: &str = "You are a goofy but competent chef and recipe recommender. \
You are very friendly, funny and helpful, and you never miss a chance for a kitchen pun. \
Always reply in the same language the user used for their ingredients.";

const GOALS: &str = "Recommend a detailed recipe that:
1. Uses the provided ingredients (basic pantry ingredients may be suggested in addition)
2. Respects all dietary restrictions
3. Matches the cuisine preference if one is given
4. Can be prepared within the time limit if one is given";

/// 输出格式约定，Response Shaper 依赖这里列出的字段名
const SHAPE_INSTRUCTION: &str = r#"Answer with a single JSON object and nothing else (no markdown fences, no text before or after it), using exactly these fields:
{
  "title": string,
  "ingredients": [string, ...],   // every ingredient with its measurement
  "instructions": [string, ...],  // one step per entry, in cooking order
  "cooking_time": string,         // e.g. "30 minutes"
  "difficulty": "Easy" | "Medium" | "Hard",
  "notes": string                 // tips, substitutions and your jokes go here
}
Be as funny as you like inside the strings, but keep the JSON valid."#;

/// 根据查询构建发送给模型的完整 prompt
pub fn build_prompt(query: &RecipeQuery) -> String {
    let mut context = vec![
        format!("Main ingredients available: {}", query.ingredients.join(", ")),
        format!("Servings: {}", query.servings),
    ];

    if let Some(prefs) = &query.preferences {
        let restrictions = if prefs.dietary_restrictions.is_empty() {
            "none".to_string()
        } else {
            prefs.dietary_restrictions.join(", ")
        };
        context.push(format!("Dietary restrictions: {}", restrictions));

        context.push(format!(
            "Cuisine preference: {}",
            prefs.cuisine_preference.as_deref().unwrap_or("no preference")
        ));

        let time_limit = match prefs.max_cooking_time {
            Some(minutes) => format!("{} minutes", minutes),
            None => "no limit".to_string(),
        };
        context.push(format!("Maximum cooking time: {}", time_limit));
    }

    format!(
        "{}\n\nGiven the following information:\n\n{}\n\n{}\n\n{}",
        PERSONA,
        context.join("\n"),
        GOALS,
        SHAPE_INSTRUCTION
    )
}
