use std::collections::BTreeMap;

use serde::Deserialize;

use crate::catalog::{subjects::subject_name, types::Exercise};

/// Lower-cased haystack a keyword query is matched against.
pub fn search_text(ex: &Exercise) -> String {
    let opt = |v: &Option<String>| v.clone().unwrap_or_default();
    [
        ex.id.clone(),
        ex.subject_code.clone(),
        ex.main_subject.clone(),
        ex.chapter.clone(),
        ex.level.clone(),
        ex.difficulty.clone(),
        ex.visibility.clone(),
        ex.source.clone(),
        ex.statement.clone(),
        ex.solution.clone(),
        ex.tags.join(" "),
        opt(&ex.institution),
        opt(&ex.year),
        opt(&ex.period),
        opt(&ex.exam_type),
        subject_name(&ex.subject_code).unwrap_or_default().to_string(),
    ]
    .join(" ")
    .to_lowercase()
}

pub fn query_tokens(query: &str) -> Vec<String> {
    query.split_whitespace().map(str::to_lowercase).collect()
}

/// Keeps exercises containing every whitespace-separated token of `query`.
/// A blank query keeps everything.
pub fn keyword_filter(exercises: Vec<Exercise>, query: &str) -> Vec<Exercise> {
    let tokens = query_tokens(query);
    if tokens.is_empty() {
        return exercises;
    }
    exercises
        .into_iter()
        .filter(|ex| {
            let text = search_text(ex);
            tokens.iter().all(|t| text.contains(t.as_str()))
        })
        .collect()
}

/// Exact-match field filters plus an optional keyword query.
/// Empty values are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExerciseFilter {
    #[serde(default, alias = "codigo_materia")]
    pub subject_code: Option<String>,
    #[serde(default, alias = "materia_principal")]
    pub main_subject: Option<String>,
    #[serde(default, alias = "nivel")]
    pub level: Option<String>,
    #[serde(default, alias = "capitulo")]
    pub chapter: Option<String>,
    #[serde(default, alias = "dificultad")]
    pub difficulty: Option<String>,
    #[serde(default, alias = "visibilidad")]
    pub visibility: Option<String>,
    #[serde(default, alias = "busqueda")]
    pub q: Option<String>,
}

fn set(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

type Field = fn(&Exercise) -> &str;

impl ExerciseFilter {
    fn fields(&self) -> [(&'static str, Option<&str>, Field); 6] {
        [
            ("subject_code", set(&self.subject_code), |e| e.subject_code.as_str()),
            ("main_subject", set(&self.main_subject), |e| e.main_subject.as_str()),
            ("level", set(&self.level), |e| e.level.as_str()),
            ("chapter", set(&self.chapter), |e| e.chapter.as_str()),
            ("difficulty", set(&self.difficulty), |e| e.difficulty.as_str()),
            ("visibility", set(&self.visibility), |e| e.visibility.as_str()),
        ]
    }

    pub fn matches(&self, ex: &Exercise) -> bool {
        self.fields()
            .iter()
            .all(|(_, wanted, field)| wanted.map_or(true, |w| field(ex) == w))
    }

    /// Keyword query first, then the field filters.
    pub fn apply(&self, exercises: Vec<Exercise>) -> Vec<Exercise> {
        let exercises = match set(&self.q) {
            Some(q) => keyword_filter(exercises, q),
            None => exercises,
        };
        exercises.into_iter().filter(|ex| self.matches(ex)).collect()
    }

    /// The filters that were actually set, by name.
    pub fn applied(&self) -> BTreeMap<&'static str, String> {
        let mut out: BTreeMap<&'static str, String> = self
            .fields()
            .into_iter()
            .filter_map(|(name, v, _)| v.map(|v| (name, v.to_string())))
            .collect();
        if let Some(q) = set(&self.q) {
            out.insert("q", q.to_string());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ex(id: &str, code: &str, level: &str, difficulty: u8, statement: &str) -> Exercise {
        serde_json::from_value(json!({
            "id": id,
            "codigo_materia": code,
            "nivel": level,
            "dificultad": difficulty,
            "enunciado": statement,
        }))
        .unwrap()
    }

    fn corpus() -> Vec<Exercise> {
        vec![
            ex("A1", "MATU", "basico", 1, "Calcular la derivada de x^2"),
            ex("A2", "MATU", "avanzado", 3, "Integral por partes"),
            ex("F1", "FISU", "basico", 2, "Movimiento rectilineo uniforme"),
        ]
    }

    #[test]
    fn field_filter_returns_only_equal_records() {
        let filter = ExerciseFilter {
            level: Some("basico".into()),
            ..Default::default()
        };
        let out = filter.apply(corpus());
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|e| e.level == "basico"));
    }

    #[test]
    fn difficulty_compares_as_text() {
        let filter = ExerciseFilter {
            difficulty: Some("3".into()),
            ..Default::default()
        };
        let out = filter.apply(corpus());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "A2");
    }

    #[test]
    fn keyword_results_contain_every_token() {
        let all = corpus();
        let out = keyword_filter(all.clone(), "  DERIVADA   matu ");
        assert_eq!(out.len(), 1);
        for e in &out {
            assert!(all.contains(e));
            let text = search_text(e);
            assert!(text.contains("derivada") && text.contains("matu"));
        }
    }

    #[test]
    fn subject_display_name_is_searchable() {
        let out = keyword_filter(corpus(), "física");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "F1");
    }

    #[test]
    fn blank_query_keeps_everything() {
        assert_eq!(keyword_filter(corpus(), "   ").len(), 3);
        assert_eq!(keyword_filter(corpus(), "").len(), 3);
    }

    #[test]
    fn applied_lists_only_set_filters() {
        let filter = ExerciseFilter {
            subject_code: Some("MATU".into()),
            chapter: Some("  ".into()),
            q: Some("integral".into()),
            ..Default::default()
        };
        let applied = filter.applied();
        assert_eq!(applied.len(), 2);
        assert_eq!(applied["subject_code"], "MATU");
        assert_eq!(applied["q"], "integral");
        assert_eq!(filter.apply(corpus()).len(), 1);
    }
}
