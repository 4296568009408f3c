use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::Value;
use thiserror::Error;

use crate::catalog::types::Exercise;

/// Exam sizes offered to students.
pub const ALLOWED_QUESTION_COUNTS: [usize; 7] = [5, 7, 8, 10, 12, 15, 20];
pub const DEFAULT_QUESTION_COUNT: usize = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExamError {
    #[error("Number of questions must be one of {allowed:?}", allowed = ALLOWED_QUESTION_COUNTS)]
    InvalidCount(String),

    #[error("Only {available} exercises are available with the selected filters")]
    PoolTooSmall { available: usize, requested: usize },
}

/// Pool restrictions; an empty list means "any".
#[derive(Debug, Clone, Default)]
pub struct ExamCriteria {
    pub levels: Vec<String>,
    pub subject_codes: Vec<String>,
    pub chapters: Vec<String>,
    pub difficulties: Vec<String>,
}

fn allows(list: &[String], value: &str) -> bool {
    list.is_empty() || list.iter().any(|v| v == value)
}

impl ExamCriteria {
    pub fn matches(&self, ex: &Exercise) -> bool {
        allows(&self.levels, &ex.level)
            && allows(&self.subject_codes, &ex.subject_code)
            && allows(&self.chapters, &ex.chapter)
            && allows(&self.difficulties, &ex.difficulty)
    }

    pub fn pool(&self, exercises: Vec<Exercise>) -> Vec<Exercise> {
        exercises.into_iter().filter(|e| self.matches(e)).collect()
    }
}

/// Accepts an integer or an integer string from one of the offered sizes.
pub fn validate_count(raw: &Value) -> Result<usize, ExamError> {
    let count = match raw {
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<usize>().ok(),
        _ => None,
    };
    match count {
        Some(n) if ALLOWED_QUESTION_COUNTS.contains(&n) => Ok(n),
        _ => Err(ExamError::InvalidCount(raw.to_string())),
    }
}

/// Draws `count` distinct exercises from the pool.
pub fn select<R: Rng + ?Sized>(
    mut pool: Vec<Exercise>,
    count: usize,
    rng: &mut R,
) -> Result<Vec<Exercise>, ExamError> {
    if pool.len() < count {
        return Err(ExamError::PoolTooSmall {
            available: pool.len(),
            requested: count,
        });
    }
    pool.shuffle(rng);
    pool.truncate(count);
    Ok(pool)
}

/// Escapes text meant for LaTeX prose, not for exercise markup.
pub fn escape_latex(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str(r"\textbackslash{}"),
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            '~' => out.push_str(r"\textasciitilde{}"),
            '^' => out.push_str(r"\textasciicircum{}"),
            _ => out.push(c),
        }
    }
    out
}

/// A printable exam: numbered statements, a page break, numbered solutions.
/// Exercise markup is inserted verbatim.
pub fn render_latex(title: &str, instructions: &str, exercises: &[Exercise]) -> String {
    let title = escape_latex(title);
    let instructions = escape_latex(instructions);

    let mut doc = format!(
        r"\documentclass[12pt,a4paper]{{article}}
\usepackage[utf8]{{inputenc}}
\usepackage[spanish]{{babel}}
\usepackage{{amsmath,amssymb,amsfonts}}
\usepackage{{geometry}}
\usepackage{{fancyhdr}}
\usepackage{{enumitem}}
\usepackage{{graphicx}}

\geometry{{margin=2.5cm}}
\pagestyle{{fancy}}
\fancyhf{{}}
\fancyhead[L]{{{title}}}
\fancyhead[R]{{Página \thepage}}
\renewcommand{{\headrulewidth}}{{0.4pt}}
\setlist[enumerate]{{label=\arabic*., leftmargin=*}}

\title{{\Huge \textbf{{{title}}}}}
\author{{Plataforma Preuniversitaria}}
\date{{\today}}

\begin{{document}}

\maketitle

\section*{{Instrucciones}}
{instructions}

\section*{{Ejercicios}}
"
    );

    for (i, ex) in exercises.iter().enumerate() {
        doc.push_str(&format!(
            "\n\\begin{{enumerate}}\n\\item[\\textbf{{{}.}}] {}\n\\end{{enumerate}}\n\n\\vspace{{1cm}}\n",
            i + 1,
            ex.statement
        ));
    }

    doc.push_str("\n\\newpage\n\\section*{Soluciones}\n");
    for (i, ex) in exercises.iter().enumerate() {
        doc.push_str(&format!(
            "\n\\textbf{{{}.}} {}\n\n\\vspace{{0.5cm}}\n",
            i + 1,
            ex.solution
        ));
    }

    doc.push_str("\n\\end{document}\n");
    doc
}

/// File name for the exported document.
pub fn export_file_name(title: &str) -> String {
    let slug: String = title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    let slug = slug.trim_matches('_');
    if slug.is_empty() {
        "simulacro.tex".to_string()
    } else {
        format!("{}.tex", slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use serde_json::json;

    fn pool(n: usize) -> Vec<Exercise> {
        (0..n)
            .map(|i| {
                serde_json::from_value(json!({
                    "id": format!("E{}", i),
                    "codigo_materia": if i % 2 == 0 { "MATU" } else { "FISU" },
                    "nivel": "basico",
                    "dificultad": (i % 3) + 1,
                    "enunciado": format!("Enunciado {}", i),
                    "solucion": format!("Solucion {}", i),
                }))
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn only_offered_sizes_are_valid() {
        for n in ALLOWED_QUESTION_COUNTS {
            assert_eq!(validate_count(&json!(n)), Ok(n));
        }
        assert_eq!(validate_count(&json!("12")), Ok(12));
        assert_eq!(validate_count(&json!(6)), Err(ExamError::InvalidCount("6".into())));
        for bad in [json!(0), json!(-5), json!(7.5), json!("abc"), json!(null), json!([5])] {
            assert!(validate_count(&bad).is_err(), "{} accepted", bad);
        }
    }

    #[test]
    fn selection_is_distinct_and_sized() {
        let mut rng = StdRng::seed_from_u64(7);
        let picked = select(pool(30), 10, &mut rng).unwrap();
        assert_eq!(picked.len(), 10);
        let mut ids: Vec<_> = picked.iter().map(|e| e.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 10);
    }

    #[test]
    fn small_pool_is_rejected() {
        let mut rng = StdRng::seed_from_u64(7);
        let err = select(pool(4), 5, &mut rng).unwrap_err();
        assert_eq!(err, ExamError::PoolTooSmall { available: 4, requested: 5 });
        assert!(err.to_string().contains("Only 4"));
    }

    #[test]
    fn criteria_restrict_the_pool() {
        let criteria = ExamCriteria {
            subject_codes: vec!["MATU".into()],
            difficulties: vec!["1".into(), "2".into()],
            ..Default::default()
        };
        let out = criteria.pool(pool(12));
        assert!(!out.is_empty());
        assert!(out
            .iter()
            .all(|e| e.subject_code == "MATU" && (e.difficulty == "1" || e.difficulty == "2")));
        assert_eq!(ExamCriteria::default().pool(pool(12)).len(), 12);
    }

    #[test]
    fn latex_document_has_statements_then_solutions() {
        let exercises = pool(2);
        let doc = render_latex("Simulacro #1", "Sin calculadora", &exercises);
        assert!(doc.starts_with(r"\documentclass"));
        assert!(doc.contains(r"Simulacro \#1"));
        let statement = doc.find("Enunciado 1").unwrap();
        let page_break = doc.find(r"\newpage").unwrap();
        let solution = doc.find("Solucion 1").unwrap();
        assert!(statement < page_break && page_break < solution);
        assert!(doc.contains(r"\item[\textbf{2.}]"));
        assert!(doc.trim_end().ends_with(r"\end{document}"));
    }

    #[test]
    fn escaping_and_file_names() {
        assert_eq!(escape_latex("50% & $x_1$"), r"50\% \& \$x\_1\$");
        assert_eq!(export_file_name("Simulacro Física 1"), "simulacro_f_sica_1.tex");
        assert_eq!(export_file_name("¡!"), "simulacro.tex");
    }
}
