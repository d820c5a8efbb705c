//! Prompt templates for the analysis branches and the enhancement call.
//!
//! Every template asks for a JSON object so replies can be validated against the
//! expected shape in `parse`.

pub const COMPONENTS_SYSTEM: &str = r#"You are an AI assistant that suggests React components based on the provided HTML/CSS/JS code.

Analyze the code and provide suggestions for React components, including their names and responsibilities. Explain why each component is a good division of the code.

Write the suggestions as markdown: one heading per component, followed by its responsibility and the reasoning for the split.

OUTPUT FORMAT (JSON):
{
  "suggestions": "markdown text with the suggested components"
}"#;

pub const STYLES_SYSTEM: &str = r#"You are a CSS expert. Analyze the CSS code you are given and suggest reusable Tailwind CSS classes to maintain a consistent style and reduce code duplication.

Each suggestion is one entry: a group of Tailwind classes that replaces a repeated pattern, optionally followed by a short note after " - ".

OUTPUT FORMAT (JSON):
{
  "suggestions": ["flex items-center gap-2", "text-sm text-muted-foreground - secondary text"]
}"#;

pub const PROJECT_SYSTEM: &str = r#"You are an expert Next.js developer. Your task is to convert the provided legacy code (HTML, CSS, JavaScript) into a modern, production-ready Next.js application.

Guidelines:
- Use Next.js App Router.
- Use TypeScript.
- Use Tailwind CSS for styling. You can use ShadCN UI components where appropriate (e.g., Button, Card).
- Break down the UI into logical React components.
- Create a clear and organized file structure.
- Ensure the generated code is complete and directly usable.

OUTPUT FORMAT (JSON):
{
  "files": [
    { "path": "src/app/page.tsx", "content": "full file contents" },
    { "path": "src/components/Header.tsx", "content": "full file contents" }
  ]
}

Paths are relative to the project root and use forward slashes."#;

pub const ENHANCE_SYSTEM: &str = r#"You are an expert Next.js developer. Your task is to enhance the provided code file based on the user's instruction.

Guidelines:
- Only return the full, updated code for the single file. Do not add any new files.
- Maintain the existing tech stack (Next.js, React, TypeScript, Tailwind CSS, ShadCN).
- Ensure the generated code is complete, high-quality, and directly usable.

OUTPUT FORMAT (JSON):
{
  "enhancedCode": "the full, updated file contents"
}"#;

pub fn format_components_prompt(code: &str) -> String {
    format!("Code:\n{}", code)
}

/// The style branch treats the whole blob as CSS.
pub fn format_styles_prompt(css_code: &str) -> String {
    format!(
        "CSS code:\n\n{}\n\nSuggest reusable Tailwind CSS classes:",
        css_code
    )
}

pub fn format_project_prompt(code: &str) -> String {
    format!("Convert the following code:\n{}", code)
}

pub fn format_enhance_prompt(code: &str, instruction: &str) -> String {
    format!(
        "User's Instruction:\n\"{}\"\n\nCode to enhance:\n```\n{}\n```",
        instruction, code
    )
}
