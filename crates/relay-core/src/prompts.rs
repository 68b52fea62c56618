// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! System-prompt template rendering.
//!
//! Agent definitions carry a prompt *template* with `{NAME}` placeholders.
//! Run-context variables fill the ordinary placeholders; two well-known ones
//! are filled by the engine itself:
//!
//! - `{TOOL_CATALOG}` — the rendered catalog of the agent's allowed tools
//! - `{AGENT_ROSTER}` — for supervisors, the delegate roster plus the
//!   delegation grammar
//!
//! When a template does not mention the well-known placeholder, the block is
//! appended after the template body instead, so a minimal template still
//! produces a usable prompt.

use std::collections::HashMap;
use std::sync::Arc;

use relay_config::AgentDefinition;
use relay_model::ToolSchema;

/// Substitute `{NAME}` placeholders from `vars`.  Placeholders with no
/// matching variable are left verbatim.
pub fn render_template(template: &str, vars: &HashMap<String, String>) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}

/// Render the tool catalog block shown to the model.
///
/// One entry per action, dotted name first, then the description and the
/// JSON argument schema.  Ends with the envelope instructions so gateways
/// without native tool calling can still drive tools through text.
pub fn render_tool_catalog(schemas: &[ToolSchema]) -> String {
    if schemas.is_empty() {
        return String::new();
    }
    let mut out = String::from("## Available tools\n\n");
    for s in schemas {
        out.push_str(&format!(
            "### {}\n{}\nArguments (JSON Schema): {}\n\n",
            s.name, s.description, s.parameters
        ));
    }
    out.push_str(
        "To call a tool, respond with exactly one JSON object and nothing else:\n\
         {\"tool_call\": {\"name\": \"<tool.action>\", \"arguments\": { ... }}}\n\
         When the task is complete, respond with:\n\
         {\"final_answer\": \"<your answer>\"}\n",
    );
    out
}

/// Render the delegate roster and delegation grammar for a supervisor.
pub fn render_agent_roster(delegates: &[Arc<AgentDefinition>]) -> String {
    let mut out = String::from("## Available agents\n\n");
    for d in delegates {
        // First line of the delegate's own prompt doubles as its blurb.
        let blurb = d.system_prompt.lines().next().unwrap_or("").trim();
        if d.name.is_empty() {
            out.push_str(&format!("- {}: {}\n", d.id, blurb));
        } else {
            out.push_str(&format!("- {} ({}): {}\n", d.id, d.name, blurb));
        }
    }
    out.push_str(
        "\nRespond with exactly one of the following forms and nothing else:\n\
         [DELEGATE agent_id] Task Description: <what the agent should do>\n\
         [FINAL_ANSWER] <your synthesized answer>\n",
    );
    out
}

/// Build the full system prompt for one run.
///
/// `vars` fills the ordinary placeholders; `tool_catalog` and `agent_roster`
/// are substituted in place when the template names them, appended otherwise.
pub fn system_prompt(
    agent: &AgentDefinition,
    vars: &HashMap<String, String>,
    tool_catalog: Option<&str>,
    agent_roster: Option<&str>,
) -> String {
    let mut prompt = render_template(&agent.system_prompt, vars);
    for (placeholder, block) in [
        ("{TOOL_CATALOG}", tool_catalog),
        ("{AGENT_ROSTER}", agent_roster),
    ] {
        let Some(block) = block.filter(|b| !b.is_empty()) else {
            prompt = prompt.replace(placeholder, "");
            continue;
        };
        if prompt.contains(placeholder) {
            prompt = prompt.replace(placeholder, block);
        } else {
            prompt.push_str("\n\n");
            prompt.push_str(block);
        }
    }
    prompt
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn template_substitutes_variables() {
        let out = render_template("Echo: {USER_REQUEST}", &vars(&[("USER_REQUEST", "hello")]));
        assert_eq!(out, "Echo: hello");
    }

    #[test]
    fn unknown_placeholder_is_left_verbatim() {
        let out = render_template("Hi {WHO}", &vars(&[]));
        assert_eq!(out, "Hi {WHO}");
    }

    #[test]
    fn catalog_lists_every_action() {
        let schemas = vec![
            ToolSchema {
                name: "file.readFile".into(),
                description: "Read a file.".into(),
                parameters: json!({"type": "object"}),
            },
            ToolSchema {
                name: "file.writeFile".into(),
                description: "Write a file.".into(),
                parameters: json!({"type": "object"}),
            },
        ];
        let out = render_tool_catalog(&schemas);
        assert!(out.contains("file.readFile"));
        assert!(out.contains("file.writeFile"));
        assert!(out.contains("tool_call"), "envelope instructions expected: {out}");
    }

    #[test]
    fn empty_catalog_renders_nothing() {
        assert!(render_tool_catalog(&[]).is_empty());
    }

    #[test]
    fn roster_names_delegates_and_grammar() {
        let delegates = vec![Arc::new(AgentDefinition::leaf(
            "coder",
            "You write code.\nMore detail.",
        ))];
        let out = render_agent_roster(&delegates);
        assert!(out.contains("- coder: You write code."));
        assert!(out.contains("[DELEGATE agent_id]"));
        assert!(out.contains("[FINAL_ANSWER]"));
    }

    #[test]
    fn roster_shows_display_name_when_set() {
        let delegates = vec![Arc::new(
            AgentDefinition::leaf("coder", "You write code.").with_name("Coder"),
        )];
        let out = render_agent_roster(&delegates);
        assert!(out.contains("- coder (Coder): You write code."));
    }

    #[test]
    fn system_prompt_substitutes_catalog_placeholder() {
        let agent = AgentDefinition::leaf("a", "Tools:\n{TOOL_CATALOG}\nGo.");
        let out = system_prompt(&agent, &vars(&[]), Some("CATALOG"), None);
        assert_eq!(out, "Tools:\nCATALOG\nGo.");
    }

    #[test]
    fn system_prompt_appends_when_placeholder_missing() {
        let agent = AgentDefinition::leaf("a", "Do the thing.");
        let out = system_prompt(&agent, &vars(&[]), Some("CATALOG"), None);
        assert!(out.starts_with("Do the thing."));
        assert!(out.ends_with("CATALOG"));
    }

    #[test]
    fn system_prompt_drops_placeholder_without_block() {
        let agent = AgentDefinition::leaf("a", "X{TOOL_CATALOG}Y");
        let out = system_prompt(&agent, &vars(&[]), None, None);
        assert_eq!(out, "XY");
    }
}
