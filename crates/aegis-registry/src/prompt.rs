use std::collections::BTreeSet;

/// Everything that goes into one agent's system prompt.
#[derive(Clone, Debug, Default)]
pub struct PromptContext {
    pub agent_id: String,
    pub enabled_tools: Vec<String>,
    pub soul_text: String,
    pub manual_text: String,
    pub trigger_summary: String,
    pub memory_citations: Vec<String>,
}

/// Assemble the system prompt deterministically: tools are deduped and
/// sorted, blank entries dropped, sections emitted in a fixed order.
pub fn build_system_prompt(context: &PromptContext) -> String {
    let tools: BTreeSet<&str> = context
        .enabled_tools
        .iter()
        .map(|tool| tool.trim())
        .filter(|tool| !tool.is_empty())
        .collect();
    let citations: Vec<&str> = context
        .memory_citations
        .iter()
        .map(|citation| citation.trim())
        .filter(|citation| !citation.is_empty())
        .collect();

    let mut lines: Vec<String> = vec![
        "You are an autonomous trading agent operating inside Aegis Trader.".to_string(),
        format!("Agent: {}", context.agent_id),
        String::new(),
        "## Safety constraints".to_string(),
        "- Hard risk constraints always override your reasoning output.".to_string(),
        "- Never execute actions outside allowed symbols/accounts/order types.".to_string(),
        "- If uncertain, choose NO TRADE and explain why.".to_string(),
        String::new(),
        "## Enabled tools".to_string(),
    ];

    if tools.is_empty() {
        lines.push("- (none)".to_string());
    } else {
        lines.extend(tools.iter().map(|tool| format!("- {tool}")));
    }

    lines.extend([
        String::new(),
        "## SOUL".to_string(),
        context.soul_text.trim().to_string(),
        String::new(),
        "## TRADING_MANUAL".to_string(),
        context.manual_text.trim().to_string(),
        String::new(),
        "## Trigger context".to_string(),
        context.trigger_summary.trim().to_string(),
        String::new(),
        "## Output requirements".to_string(),
        "- Respond with concise blocks-oriented reasoning.".to_string(),
        "- Include explicit risk rationale for trade proposals.".to_string(),
        "- Cite relevant memory lines when they affect decisions.".to_string(),
    ]);

    if !citations.is_empty() {
        lines.push(String::new());
        lines.push("## Memory citations".to_string());
        lines.extend(citations.iter().map(|citation| format!("- {citation}")));
    }

    format!("{}\n", lines.join("\n").trim())
}
