//! Limpieza determinista de las respuestas del LLM.
//!
//! Es una heurística de texto, no un parser: no conoce la sintaxis de TSX y
//! puede recortar de más si la última línea válida no acaba en `}`, `;` o `>`
//! (por ejemplo, un `)` final).

use std::sync::LazyLock;

use regex::Regex;

/// Frases con las que el modelo suele empezar antes del código.
pub const PREAMBLES: &[&str] = &[
    "Certainly! Here's",
    "Here's the",
    "Sure! Here's",
    "Here is the",
    "Below is the",
    "I've created",
    "I've modified",
];

static FENCED_BLOCK: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:typescript|tsx|javascript|jsx)?\n(.*?)```").ok());

/// Extrae el fragmento de código utilizable de una respuesta del LLM.
pub fn clean_completion(raw: &str) -> String {
    let text = strip_preamble(raw);
    let text = longest_fenced_block(&text).unwrap_or(text);
    let text = strip_trailing_prose(&text);
    text.trim().to_string()
}

/// Si la respuesta empieza con un preámbulo conocido, descarta todo lo
/// anterior a la primera línea `import`/`export`.
fn strip_preamble(text: &str) -> String {
    let starts_with_preamble = PREAMBLES.iter().any(|p| text.trim().starts_with(p));
    if !starts_with_preamble {
        return text.to_string();
    }

    let lines: Vec<&str> = text.split('\n').collect();
    match lines.iter().position(|line| {
        let line = line.trim();
        line.starts_with("import ") || line.starts_with("export ")
    }) {
        Some(i) => lines[i..].join("\n"),
        None => text.to_string(),
    }
}

/// De todos los bloques cercados, el más largo (el primero en caso de empate).
fn longest_fenced_block(text: &str) -> Option<String> {
    if !text.contains("```") {
        return None;
    }
    let re = FENCED_BLOCK.as_ref()?;

    let mut longest: Option<&str> = None;
    for caps in re.captures_iter(text) {
        let block = caps.get(1).map_or("", |m| m.as_str());
        if longest.map_or(true, |l| block.len() > l.len()) {
            longest = Some(block);
        }
    }
    longest.map(str::to_string)
}

/// Corta tras la última línea de código que no sea comentario y acabe en
/// `}`, `;` o `>`. Si no hay ninguna, el texto queda intacto.
fn strip_trailing_prose(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let last_code_line = lines
        .iter()
        .rposition(|line| {
            let line = line.trim();
            !line.is_empty()
                && !line.starts_with("//")
                && !line.starts_with('*')
                && (line.ends_with('}') || line.ends_with(';') || line.ends_with('>'))
        })
        .unwrap_or(lines.len().saturating_sub(1));

    lines[..=last_code_line].join("\n")
}
