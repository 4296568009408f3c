//! Authoring markup to HTML.
//!
//! Inline math (`$...$`) is passed through untouched for the client-side
//! math renderer; only text formatting, lists, figures and a few symbol
//! macros are converted here.

use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::{Captures, Regex};

/// Exporter layout: `ejercicios_nuevo/<main subject>/<chapter>/imagenes/`.
const MAIN_SUBJECT_DIRS: &[&str] = &[
    "matematicas_preuniversitaria",
    "fisica_preuniversitaria",
    "quimica_preuniversitaria",
    "lenguaje_literatura",
];

/// Pre-hierarchy layout: `ejercicios/<subject>/`.
const LEGACY_SUBJECT_DIRS: &[&str] = &["fisica", "geometria", "calculo", "algebra"];

lazy_static! {
    static ref FIGURE: Regex =
        Regex::new(r"(?s)\\begin\{figure\}(?:\[[^\]]*\])?(.*?)\\end\{figure\}").unwrap();
    static ref INCLUDE_GRAPHICS: Regex =
        Regex::new(r"\\includegraphics(?:\[[^\]]*\])?\{([^}]+)\}").unwrap();
    static ref CAPTION: Regex = Regex::new(r"\\caption\{([^}]+)\}").unwrap();
    static ref ANSWER: Regex = Regex::new(r"\\textbf\{Respuesta:\}\s*([^<]+)").unwrap();
    static ref NOTE: Regex = Regex::new(r"\\textbf\{Nota:\}\s*([^<]+)").unwrap();
    static ref BOLD: Regex = Regex::new(r"\\textbf\{([^}]+)\}").unwrap();
    static ref ITALIC: Regex = Regex::new(r"\\textit\{([^}]+)\}").unwrap();
    static ref UNDERLINE: Regex = Regex::new(r"\\underline\{([^}]+)\}").unwrap();
    static ref PLAIN_TEXT: Regex = Regex::new(r"\\text\{([^}]+)\}").unwrap();
    static ref ITEMIZE: Regex =
        Regex::new(r"(?s)\\begin\{itemize\}(.*?)\\end\{itemize\}").unwrap();
    static ref ENUMERATE: Regex =
        Regex::new(r"(?s)\\begin\{enumerate\}(.*?)\\end\{enumerate\}").unwrap();
    static ref ITEM: Regex = Regex::new(r"\\item\s*").unwrap();
    static ref ADJACENT_UL: Regex = Regex::new(r"</ul>\s*<ul>").unwrap();
    static ref ADJACENT_OL: Regex = Regex::new(r"</ol>\s*<ol>").unwrap();
    static ref SYMBOLS: [(Regex, &'static str); 4] = [
        (Regex::new(r"\\cdot\b").unwrap(), "·"),
        (Regex::new(r"\\div\b").unwrap(), "÷"),
        (Regex::new(r"\\to\b").unwrap(), "→"),
        (Regex::new(r"\\infty\b").unwrap(), "∞"),
    ];
}

/// Renders exercise markup, resolving figure images under `static_dir`.
#[derive(Debug, Clone)]
pub struct MarkupRenderer {
    static_dir: PathBuf,
}

impl MarkupRenderer {
    pub fn new(static_dir: impl Into<PathBuf>) -> Self {
        Self {
            static_dir: static_dir.into(),
        }
    }

    pub fn render(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        let text = text
            .lines()
            .filter(|l| {
                let t = l.trim();
                !t.is_empty() && !t.starts_with('%')
            })
            .collect::<Vec<_>>()
            .join("\n");

        let text = FIGURE.replace_all(&text, |caps: &Captures| self.figure(caps));
        let text = text.replace('\n', "<br>");

        // Callouts must run before the generic bold rule consumes their label.
        let text = ANSWER.replace_all(
            &text,
            r#"<div class="alert alert-success mt-3"><strong>Respuesta:</strong> ${1}</div>"#,
        );
        let text = NOTE.replace_all(
            &text,
            r#"<div class="alert alert-info mt-2"><strong>Nota:</strong> ${1}</div>"#,
        );

        let text = BOLD.replace_all(&text, "<strong>${1}</strong>");
        let text = ITALIC.replace_all(&text, "<em>${1}</em>");
        let text = UNDERLINE.replace_all(&text, "<u>${1}</u>");
        let text = PLAIN_TEXT.replace_all(&text, "${1}");

        let text = ITEMIZE.replace_all(&text, "<ul>${1}</ul>");
        let text = ENUMERATE.replace_all(&text, "<ol>${1}</ol>");
        let text = ITEM.replace_all(&text, "<li>");
        let text = ADJACENT_UL.replace_all(&text, "");
        let mut text = ADJACENT_OL.replace_all(&text, "").into_owned();

        for (re, symbol) in SYMBOLS.iter() {
            text = re.replace_all(&text, *symbol).into_owned();
        }
        text
    }

    fn figure(&self, caps: &Captures) -> String {
        let body = caps.get(1).map_or("", |m| m.as_str());
        let Some(image) = INCLUDE_GRAPHICS.captures(body).and_then(|c| c.get(1)) else {
            return caps[0].to_string();
        };

        let src = self.resolve_image(image.as_str().trim());
        let caption = CAPTION
            .captures(body)
            .and_then(|c| c.get(1))
            .map(|c| {
                format!(
                    r#"<figcaption class="text-center mt-2 text-muted"><small><em>{}</em></small></figcaption>"#,
                    c.as_str()
                )
            })
            .unwrap_or_default();

        format!(
            r#"<figure class="text-center my-4"><img src="{}" alt="Diagrama" class="img-fluid rounded shadow-sm" style="max-width: 100%; height: auto;">{}</figure>"#,
            src, caption
        )
    }

    /// Public URL of a figure image, searching the exporter layout first.
    pub fn resolve_image(&self, image: &str) -> String {
        let new_root = self.static_dir.join("ejercicios_nuevo");
        for subject in MAIN_SUBJECT_DIRS {
            for chapter in chapter_dirs(&new_root.join(subject)) {
                if new_root
                    .join(subject)
                    .join(&chapter)
                    .join("imagenes")
                    .join(image)
                    .is_file()
                {
                    return format!(
                        "/static/ejercicios_nuevo/{}/{}/imagenes/{}",
                        subject, chapter, image
                    );
                }
            }
        }

        for subject in LEGACY_SUBJECT_DIRS {
            if self
                .static_dir
                .join("ejercicios")
                .join(subject)
                .join(image)
                .is_file()
            {
                return format!("/static/ejercicios/{}/{}", subject, image);
            }
        }

        format!("/static/ejercicios/{}", image)
    }
}

fn chapter_dirs(subject_dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(subject_dir) else {
        return Vec::new();
    };
    let mut dirs: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().into_string().ok())
        .collect();
    dirs.sort();
    dirs
}
