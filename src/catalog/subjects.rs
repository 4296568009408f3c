use std::collections::BTreeMap;

use serde::Serialize;

const FALLBACK_COLOR: &str = "#6b7280";

/// Subject code, display name, colour.
pub const SUBJECTS: &[(&str, &str, &str)] = &[
    ("MATU", "Matemáticas Preuniversitaria", "#2563eb"),
    ("FISU", "Física Preuniversitaria", "#dc2626"),
    ("QUIM", "Química Preuniversitaria", "#16a34a"),
    ("LENG", "Lenguaje y Literatura", "#ea580c"),
    ("CAL2", "Cálculo 2", "#7c3aed"),
    ("ALGN", "Álgebra Lineal", "#0891b2"),
    ("FIS1", "Física 1", "#be123c"),
    ("FIS2", "Física 2", "#a21caf"),
    ("HIST", "Historia", "#ca8a04"),
    ("EDIF", "Ecuaciones Diferenciales", "#059669"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectInfo {
    pub name: String,
    pub color: String,
}

/// Display info for a subject code; unknown codes are shown as-is in grey.
pub fn subject_info(code: &str) -> SubjectInfo {
    SUBJECTS
        .iter()
        .find(|(c, _, _)| *c == code)
        .map(|(_, name, color)| SubjectInfo {
            name: (*name).to_string(),
            color: (*color).to_string(),
        })
        .unwrap_or_else(|| SubjectInfo {
            name: code.to_string(),
            color: FALLBACK_COLOR.to_string(),
        })
}

/// Display name for known codes only.
pub fn subject_name(code: &str) -> Option<&'static str> {
    SUBJECTS
        .iter()
        .find(|(c, _, _)| *c == code)
        .map(|(_, name, _)| *name)
}

pub fn subject_table() -> BTreeMap<&'static str, SubjectInfo> {
    SUBJECTS
        .iter()
        .map(|(code, _, _)| (*code, subject_info(code)))
        .collect()
}
