//! Plantillas de prompt para las tres etapas del pipeline.

use crate::models::RetrievalResult;

pub const INTENT_PREAMBLE: &str = r#"
You analyse website generation requests and turn them into structured intent.
Answer with a single valid JSON object and nothing else, using these keys:
- "siteType": the kind of site (e.g. "saas_landing", "portfolio", "ecommerce", "blog").
- "requiredComponents": ordered list of component categories the page needs,
  chosen from: {categories}.
- "styleHints": object with tone, colour preferences and design style.
- "contentHints": object with any concrete content the user mentioned.

Example:
{"siteType": "saas_landing", "requiredComponents": ["navigation", "hero", "footer"],
 "styleHints": {"tone": "professional", "style": "modern"},
 "contentHints": {"focus": "productivity tool"}}
"#;

pub const COMPOSITION_PREAMBLE: &str = r#"
You are a senior React developer assembling a Next.js page out of pre-built components.
Rules:
1. Reuse every component exactly as given; never rewrite its code.
2. Write the page with correct imports from '@/components/<category>/<id>'.
3. Give every component sensible props for the user's request.
4. Keep the Tailwind styling conventions of the components.
5. Use TypeScript.
Return ONLY raw TypeScript code starting with the imports: no prose, no markdown.
"#;

pub const UNIQUENESS_PREAMBLE: &str = r#"
You are a web designer giving an assembled page its own personality.
You may only change copy and headings, colours, spacing and prop values.
Never touch the component imports or the component structure.
Return ONLY the raw code starting with the imports: no prose, no markdown.
"#;

/// Preámbulo de intención con las categorías de este despliegue.
pub fn intent_preamble(categories: &[String]) -> String {
    INTENT_PREAMBLE.replace("{categories}", &categories.join(", "))
}

pub fn intent_prompt(user_prompt: &str) -> String {
    format!("User prompt: {user_prompt}")
}

/// Cada componente distinto una sola vez, etiquetado con su id.
pub fn components_context(selected: &[RetrievalResult]) -> String {
    let mut seen = std::collections::HashSet::new();
    selected
        .iter()
        .filter(|r| seen.insert(r.component_id.as_str()))
        .map(|r| {
            format!(
                "### {}\n```typescript\n{}\n```\n",
                r.component_id, r.record.code
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn composition_prompt(user_prompt: &str, context: &str) -> String {
    format!("User request: {user_prompt}\n\nAvailable components:\n{context}")
}

pub fn uniqueness_prompt(user_prompt: &str, code: &str) -> String {
    format!("Original code:\n```tsx\n{code}\n```\n\nUser's intent: {user_prompt}")
}
