use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    catalog::{dto::ExerciseView, types::string_list},
    exams::services::{ExamCriteria, DEFAULT_QUESTION_COUNT},
    quota::dto::LimitSnapshot,
};

fn default_count() -> Value {
    Value::from(DEFAULT_QUESTION_COUNT)
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExamRequest {
    /// Raw client value; checked by `validate_count`.
    #[serde(default = "default_count", alias = "num_preguntas")]
    pub num_questions: Value,
    #[serde(default, alias = "niveles", deserialize_with = "string_list")]
    pub levels: Vec<String>,
    #[serde(default, alias = "codigos_materia", deserialize_with = "string_list")]
    pub subject_codes: Vec<String>,
    #[serde(default, alias = "capitulos", deserialize_with = "string_list")]
    pub chapters: Vec<String>,
    #[serde(default, alias = "dificultades", deserialize_with = "string_list")]
    pub difficulties: Vec<String>,
}

impl ExamRequest {
    pub fn criteria(&self) -> ExamCriteria {
        ExamCriteria {
            levels: self.levels.clone(),
            subject_codes: self.subject_codes.clone(),
            chapters: self.chapters.clone(),
            difficulties: self.difficulties.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExamResponse {
    pub exercises: Vec<ExerciseView>,
    pub total: usize,
    pub configuration: ExamRequest,
    pub limit: LimitSnapshot,
}

#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    #[serde(default)]
    pub title: String,
    pub exercise_ids: Vec<String>,
    #[serde(default)]
    pub instructions: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_defaults_and_legacy_keys() {
        let req: ExamRequest = serde_json::from_value(json!({})).unwrap();
        assert_eq!(req.num_questions, json!(10));
        assert!(req.levels.is_empty());

        let req: ExamRequest = serde_json::from_value(json!({
            "num_preguntas": 5,
            "codigos_materia": ["MATU"],
            "dificultades": [1, 2]
        }))
        .unwrap();
        assert_eq!(req.num_questions, json!(5));
        assert_eq!(req.subject_codes, vec!["MATU"]);
        assert_eq!(req.criteria().difficulties, vec!["1", "2"]);
    }

    #[test]
    fn malformed_size_still_parses() {
        let req: ExamRequest = serde_json::from_value(json!({"num_questions": -5})).unwrap();
        assert_eq!(req.num_questions, json!(-5));
        let req: ExamRequest = serde_json::from_value(json!({"num_questions": "diez"})).unwrap();
        assert_eq!(req.num_questions, json!("diez"));
    }
}
