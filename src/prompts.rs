//! Extraction prompt sent to the generation service.
//!
//! Centralising the prompt here keeps the wording in one place and lets unit
//! tests inspect it directly without calling a model. The example schema is
//! generated from [`CANONICAL_FIELDS`] so the prompt can never drift from the
//! spreadsheet headers.

use crate::record::CANONICAL_FIELDS;

/// Instruction placed before the field list.
pub const EXTRACTION_PREAMBLE: &str =
    "Analyse ce document et extrais les informations suivantes :";

/// One hint line per canonical field, same order as [`CANONICAL_FIELDS`].
const FIELD_HINTS: [&str; 15] = [
    "Raison sociale",
    "Sigle",
    "Responsabilité légale (nom et fonction de chaque responsable légal, \
     ex : \"DUPONT JEAN GÉRANT\" ; plusieurs responsables séparés par \" / \")",
    "Adresse complète",
    "Téléphone",
    "Portable",
    "E-mail",
    "Site Internet",
    "SIRET",
    "Code NACE",
    "Assurance Travaux",
    "Assurance Civile",
    "Effectif moyen",
    "Chiffre d\u{2019}affaires H.T. (si disponible)",
    "Qualifications professionnelles (toutes les entrées, séparées par \";\")",
];

/// Output-format rules following the field list.
pub const OUTPUT_RULES: &str = "Réponds uniquement avec un seul objet JSON, \
dans un bloc ```json, avec exactement les clés ci-dessous. \
Utilise null pour toute information absente du document.";

/// Header introducing the document text.
pub const CONTENT_HEADER: &str = "Contenu du fichier PDF :";

/// Build the prompt for one document.
///
/// Pure and deterministic: identical text yields an identical prompt. The
/// extracted text is appended verbatim as the last section.
pub fn build_extraction_prompt(text: &str) -> String {
    let mut prompt = String::with_capacity(text.len() + 2048);

    prompt.push_str(EXTRACTION_PREAMBLE);
    prompt.push('\n');
    for hint in FIELD_HINTS {
        prompt.push_str("- ");
        prompt.push_str(hint);
        prompt.push('\n');
    }

    prompt.push('\n');
    prompt.push_str(OUTPUT_RULES);
    prompt.push_str("\n\n");
    prompt.push_str(&example_schema());
    prompt.push_str("\n\n");
    prompt.push_str(CONTENT_HEADER);
    prompt.push('\n');
    prompt.push_str(text);
    prompt
}

/// The fenced JSON example shown to the model.
fn example_schema() -> String {
    let body = CANONICAL_FIELDS
        .iter()
        .map(|field| format!("  \"{field}\": \"...\""))
        .collect::<Vec<_>>()
        .join(",\n");
    format!("```json\n{{\n{body}\n}}\n```")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_is_deterministic() {
        let a = build_extraction_prompt("SARL ACME\nSIRET 123");
        let b = build_extraction_prompt("SARL ACME\nSIRET 123");
        assert_eq!(a, b);
    }

    #[test]
    fn prompt_ends_with_document_text() {
        let text = "  Ligne 1\n\nLigne 2 avec ```backticks```  ";
        let prompt = build_extraction_prompt(text);
        assert!(prompt.ends_with(text));
        assert!(prompt.contains(CONTENT_HEADER));
    }

    #[test]
    fn schema_lists_every_field() {
        let prompt = build_extraction_prompt("");
        for field in CANONICAL_FIELDS {
            assert!(
                prompt.contains(&format!("\"{field}\": \"...\"")),
                "missing {field}"
            );
        }
        assert!(prompt.contains("```json\n{"));
    }

    #[test]
    fn hints_follow_column_order() {
        for (hint, field) in FIELD_HINTS.iter().zip(CANONICAL_FIELDS) {
            let head = field.split_whitespace().next().unwrap_or(field);
            assert!(hint.starts_with(head), "{hint} vs {field}");
        }
    }
}
