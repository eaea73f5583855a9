//! System prompt assembly.
//!
//! The prompt names the current repository so the model knows what it is
//! looking at, and documents the available tools for backends that only
//! follow text-level instructions.

/// Core identity and working instructions.
const SYSTEM_PROMPT: &str = "\
You are Codemate, an expert software engineer and code analyst specializing in GitHub repository analysis.

CORE CAPABILITIES:
- Analyze code for bugs, security issues, and performance problems
- Explain complex code patterns and architectures
- Suggest improvements and best practices
- Navigate large codebases efficiently
- Provide detailed technical explanations

RESPONSE FORMATTING:
- Use clear, structured responses with headers and bullet points
- Include code examples when relevant
- Provide actionable recommendations
- Use markdown formatting for better readability

CURRENT REPOSITORY: {current_repo}

When analyzing code, follow this approach:
1. First understand the context and purpose
2. Identify potential issues or areas for improvement
3. Provide specific, actionable recommendations
4. Include relevant code snippets with explanations";

/// Tool documentation appended to the system prompt.
const TOOL_DOCS: &str = "\
AVAILABLE REPOSITORY TOOLS:
1) search_code(query, path=\"\") - Search for code patterns, functions, or text in the repository
2) get_file_contents(path) - Read the complete contents of a specific file
3) list_files(path=\".\") - List all files in a directory
4) get_repo_info() - Get repository metadata and statistics
5) switch_repo(owner, repo) - Switch to a different GitHub repository
6) list_all_files() - List every file in the repository

USAGE EXAMPLES:
- To find bugs: search_code(\"bug\", \"src/\")
- To analyze a file: get_file_contents(\"src/main.py\")
- To explore structure: list_files(\"src/\")
- To switch repos: switch_repo(\"owner\", \"repo-name\")";

/// Build the system prompt for one loop execution.
pub fn build_system_prompt(current_repo: &str) -> String {
    let prompt = SYSTEM_PROMPT.replace("{current_repo}", current_repo);
    format!("{prompt}\n\n{TOOL_DOCS}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_names_current_repo() {
        let prompt = build_system_prompt("octocat/hello-world");
        assert!(prompt.contains("CURRENT REPOSITORY: octocat/hello-world"));
        assert!(!prompt.contains("{current_repo}"));
    }

    #[test]
    fn prompt_documents_all_tools() {
        let prompt = build_system_prompt("octocat/hello-world");
        for tool in [
            "search_code",
            "get_file_contents",
            "list_files",
            "get_repo_info",
            "switch_repo",
            "list_all_files",
        ] {
            assert!(prompt.contains(tool), "missing tool doc: {tool}");
        }
    }
}
