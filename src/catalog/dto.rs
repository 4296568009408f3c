use std::{collections::BTreeMap, sync::Arc};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::{
    catalog::{
        render::MarkupRenderer,
        subjects::{subject_info, SubjectInfo},
        types::Exercise,
    },
    quota::dto::LimitSnapshot,
};

pub const SEARCH_RESULT_CAP: usize = 10;

#[derive(Debug, Deserialize)]
pub struct Pagination {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// An exercise as returned by the API, with its subject's display info.
#[derive(Debug, Clone, Serialize)]
pub struct ExerciseView {
    #[serde(flatten)]
    pub exercise: Exercise,
    pub subject_info: SubjectInfo,
}

impl ExerciseView {
    pub fn raw(exercise: Exercise) -> Self {
        let subject_info = subject_info(&exercise.subject_code);
        Self {
            exercise,
            subject_info,
        }
    }

    /// Statement and solution converted to HTML.
    pub fn rendered(mut exercise: Exercise, renderer: &MarkupRenderer) -> Self {
        exercise.statement = renderer.render(&exercise.statement);
        exercise.solution = renderer.render(&exercise.solution);
        Self::raw(exercise)
    }
}

/// Renders on the blocking pool; figure lookup touches the filesystem.
pub async fn render_all(
    renderer: Arc<MarkupRenderer>,
    exercises: Vec<Exercise>,
) -> anyhow::Result<Vec<ExerciseView>> {
    tokio::task::spawn_blocking(move || {
        exercises
            .into_iter()
            .map(|e| ExerciseView::rendered(e, &renderer))
            .collect()
    })
    .await
    .context("render exercises")
}

pub async fn render_one(
    renderer: Arc<MarkupRenderer>,
    exercise: Exercise,
) -> anyhow::Result<ExerciseView> {
    tokio::task::spawn_blocking(move || ExerciseView::rendered(exercise, &renderer))
        .await
        .context("render exercise")
}

#[derive(Debug, Serialize)]
pub struct ExerciseListResponse {
    pub total: usize,
    pub exercises: Vec<ExerciseView>,
    pub applied_filters: BTreeMap<&'static str, String>,
}

#[derive(Debug, Serialize)]
pub struct ExerciseDetailResponse {
    pub exercise: ExerciseView,
    pub limit: LimitSnapshot,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub exercises: Vec<ExerciseView>,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shown: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

impl SearchResponse {
    pub fn empty() -> Self {
        Self {
            exercises: Vec::new(),
            total: 0,
            shown: None,
            query: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn batch_rendering_keeps_order() {
        let renderer = Arc::new(MarkupRenderer::new("/nonexistent/preu-static"));
        let exercises: Vec<Exercise> = ["A", "B"]
            .iter()
            .map(|id| {
                serde_json::from_value(json!({
                    "id": id,
                    "codigo_materia": "MATU",
                    "enunciado": format!("\\textbf{{{}}}", id),
                }))
                .unwrap()
            })
            .collect();

        let views = render_all(renderer.clone(), exercises.clone()).await.unwrap();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].exercise.id, "A");
        assert_eq!(views[1].exercise.statement, "<strong>B</strong>");
        assert_eq!(views[1].subject_info.color, "#2563eb");

        let one = render_one(renderer, exercises[0].clone()).await.unwrap();
        assert_eq!(one.exercise.statement, "<strong>A</strong>");
    }
}
