use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::catalog::types::Exercise;

const EXERCISE_FILES: &[&str] = &["todos_ejercicios_nuevo.json", "todos_ejercicios.json"];
const METADATA_FILES: &[&str] = &["metadata_ejercicios_nuevo.json", "metadata_ejercicios.json"];
const THEORY_FILE: &str = "teoria_capitulos.json";
const FORMULARY_FILE: &str = "formularios.json";

/// Read-only view over the exporter's JSON output directory.
///
/// Files are read on every call so a re-export is picked up without a restart.
#[derive(Debug, Clone)]
pub struct Catalog {
    dir: PathBuf,
}

impl Catalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// First candidate file that exists and parses.
    async fn read_first(&self, names: &[&str]) -> Option<Value> {
        for name in names {
            let path = self.dir.join(name);
            let bytes = match tokio::fs::read(&path).await {
                Ok(b) => b,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(path = %path.display(), "catalog file missing");
                    continue;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "catalog file unreadable");
                    continue;
                }
            };
            match serde_json::from_slice(&bytes) {
                Ok(v) => return Some(v),
                Err(e) => warn!(path = %path.display(), error = %e, "catalog file is not valid JSON"),
            }
        }
        None
    }

    /// All exercises; records that do not fit the exercise shape are skipped.
    pub async fn exercises(&self) -> Vec<Exercise> {
        let Some(mut doc) = self.read_first(EXERCISE_FILES).await else {
            warn!(dir = %self.dir.display(), "no exercise file found");
            return Vec::new();
        };
        let Some(Value::Array(items)) = doc.get_mut("ejercicios").map(Value::take) else {
            warn!("exercise file has no `ejercicios` list");
            return Vec::new();
        };

        items
            .into_iter()
            .enumerate()
            .filter_map(|(i, item)| match serde_json::from_value::<Exercise>(item) {
                Ok(ex) => Some(ex),
                Err(e) => {
                    warn!(index = i, error = %e, "skipping malformed exercise");
                    None
                }
            })
            .collect()
    }

    pub async fn find(&self, id: &str) -> Option<Exercise> {
        self.exercises().await.into_iter().find(|e| e.id == id)
    }

    /// Index of counts by subject, chapter, level, difficulty and code.
    pub async fn metadata(&self) -> Value {
        match self.read_first(METADATA_FILES).await {
            Some(Value::Object(mut map)) => {
                let codes = map.get("codigos_materia").cloned().unwrap_or_else(|| json!({}));
                let total = map.get("total_ejercicios").cloned().unwrap_or_else(|| json!(0));
                map.insert("materias".into(), codes);
                map.insert("visibles_web".into(), total);
                map.insert("no_visibles_web".into(), json!(0));
                Value::Object(map)
            }
            _ => default_metadata(),
        }
    }

    pub async fn theory(&self) -> Value {
        self.read_first(&[THEORY_FILE])
            .await
            .unwrap_or_else(|| json!({ "capitulos": {} }))
    }

    pub async fn formularies(&self) -> Value {
        self.read_first(&[FORMULARY_FILE])
            .await
            .unwrap_or_else(|| json!({ "formularios": {}, "formularios_generales": {} }))
    }

    /// Storage key of a downloadable formulary, by its catalog key.
    pub async fn formulary_file(&self, key: &str) -> Option<String> {
        formulary_file_in(&self.formularies().await, key)
    }
}

fn default_metadata() -> Value {
    json!({
        "total_ejercicios": 0,
        "materias_principales": {},
        "capitulos": {},
        "niveles": {},
        "dificultades": {},
        "codigos_materia": {},
        "materias": {},
        "visibles_web": 0,
        "no_visibles_web": 0
    })
}

fn formulary_file_in(doc: &Value, key: &str) -> Option<String> {
    ["formularios", "formularios_generales"]
        .iter()
        .filter_map(|section| doc.get(section)?.get(key))
        .find_map(|entry| entry.get("archivo")?.as_str().map(str::to_string))
}
