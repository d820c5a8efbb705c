use super::client::truncate_str;
use crate::project::ProjectFile;
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Strip markdown code fences from a response
fn strip_markdown_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let clean = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    clean.strip_suffix("```").unwrap_or(clean).trim()
}

/// Extract a JSON fragment between matching delimiters
fn extract_json_fragment(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if start <= end {
        Some(&text[start..=end])
    } else {
        None
    }
}

/// Try to fix common JSON issues from LLM responses
fn fix_json_issues(json: &str) -> String {
    let mut fixed = json.to_string();

    // Remove trailing commas before ] or }
    fixed = fixed.replace(",]", "]");
    fixed = fixed.replace(",}", "}");

    // Smart quotes to regular quotes
    fixed = fixed.replace(['\u{201C}', '\u{201D}'], "\"");
    fixed = fixed.replace(['\u{2018}', '\u{2019}'], "'");

    fixed
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

/// Parse the JSON object a model replied with into `T`.
///
/// The strict parse runs first; the lenient repair pass only runs when it fails so that
/// code inside string values is never rewritten on a well-formed reply.
pub(crate) fn parse_json_object<T: DeserializeOwned>(response: &str) -> anyhow::Result<T> {
    let clean = strip_markdown_fences(response);
    let candidate = extract_json_fragment(clean, '{', '}').unwrap_or(clean);

    match serde_json::from_str::<T>(candidate) {
        Ok(value) => Ok(value),
        Err(first_err) => {
            let fixed = fix_json_issues(candidate);
            serde_json::from_str::<T>(&fixed).map_err(|_| {
                anyhow::anyhow!(
                    "Model reply did not match the expected shape ({}). Response preview: {}",
                    first_err,
                    truncate_str(candidate, 200)
                )
            })
        }
    }
}

#[derive(Deserialize)]
struct ComponentSuggestionsJson {
    suggestions: String,
}

#[derive(Deserialize)]
struct StyleSuggestionsJson {
    suggestions: Vec<String>,
}

#[derive(Deserialize)]
struct ProjectStructureJson {
    files: Vec<ProjectFile>,
}

#[derive(Deserialize)]
struct EnhancedCodeJson {
    #[serde(rename = "enhancedCode", alias = "enhanced_code")]
    enhanced_code: String,
}

/// Component suggestions: free-form markdown, passed through untouched.
pub(crate) fn parse_component_suggestions(response: &str) -> anyhow::Result<String> {
    Ok(parse_json_object::<ComponentSuggestionsJson>(response)?.suggestions)
}

/// Style suggestions in the order the model returned them.
pub(crate) fn parse_style_suggestions(response: &str) -> anyhow::Result<Vec<String>> {
    Ok(parse_json_object::<StyleSuggestionsJson>(response)?.suggestions)
}

/// Generated project files in the order the model returned them.
pub(crate) fn parse_project_files(response: &str) -> anyhow::Result<Vec<ProjectFile>> {
    Ok(parse_json_object::<ProjectStructureJson>(response)?.files)
}

pub(crate) fn parse_enhanced_code(response: &str) -> anyhow::Result<String> {
    Ok(parse_json_object::<EnhancedCodeJson>(response)?.enhanced_code)
}
