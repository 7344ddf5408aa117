//! Prompt builders.
//!
//! Each builder fixes the contract of one generation step: which inputs go in
//! and what shape of output is asked for. Wording can change freely; the
//! structure requested (five PRD sections, a bare language name, a Markdown
//! checklist) is what the pipelines rely on.

/// English PRD draft from the issue and the repository README.
pub fn draft_prd(title: &str, body: &str, readme: &str) -> String {
    format!(
        "You are an experienced product manager. Write a Product Requirements Document (PRD) \
         in English for the GitHub issue below, using the repository README for context.\n\n\
         **Issue title:**\n{title}\n\n\
         **Issue body:**\n{body}\n\n\
         **Repository README:**\n{readme}\n\n\
         Structure the PRD with exactly these sections:\n\
         1. **Background:** the context and the problem being solved\n\
         2. **Goals:** the primary objectives\n\
         3. **User Stories:** written as \"As a [user type], I want [an action] so that [a benefit]\"\n\
         4. **Requirements:** functional and non-functional requirements\n\
         5. **Success Metrics:** how success will be measured\n"
    )
}

/// Language identification of the raw issue body. The answer must be a bare
/// language name.
pub fn detect_language(text: &str) -> String {
    format!(
        "Identify the primary language of the text below. Answer with the language name only, \
         for example 'Japanese' or 'Traditional Chinese'.\n\nText:\n{text}"
    )
}

/// Translation of the English PRD into `language`, keeping its layout.
pub fn translate_prd(language: &str, english_prd: &str) -> String {
    format!(
        "Translate the following English PRD into {language}. Keep the Markdown formatting and \
         section structure unchanged.\n\n**English PRD:**\n{english_prd}"
    )
}

/// Checklist decomposition of a PRD comment (both language sections included).
pub fn subtasks(prd: &str) -> String {
    format!(
        "You are an experienced project manager. Break the Product Requirements Document below \
         into actionable sub-tasks for the development team. Every sub-task must be a single, \
         distinct piece of work.\n\n\
         Answer with a GitHub-flavored Markdown checklist only, one item per line, each naming \
         the main function to deliver. For example:\n\
         - [ ] Set up the initial project structure and CI pipeline.\n\
         - [ ] Implement the user authentication module.\n\n\
         **PRD:**\n{prd}"
    )
}

/// Instruction handed to the patch agent.
pub fn feature_instruction(title: &str, body: &str) -> String {
    format!(
        "Modify the code in this repository to implement the feature described in the following \
         GitHub issue. Only change the files you were given.\n\n\
         **Issue title:** {title}\n\n**Issue body:**\n{body}"
    )
}
