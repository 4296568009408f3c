use std::fmt;

use serde::{
    de::{self, SeqAccess, Visitor},
    Deserialize, Deserializer, Serialize,
};

/// One practice exercise as written by the offline exporter.
///
/// Input keys are the exporter's; output uses the field names below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Exercise {
    pub id: String,
    #[serde(alias = "codigo_materia", default)]
    pub subject_code: String,
    #[serde(alias = "materia_principal", default)]
    pub main_subject: String,
    #[serde(alias = "capitulo", default)]
    pub chapter: String,
    #[serde(alias = "subtema", default)]
    pub subtopic: String,
    #[serde(alias = "nivel", default = "default_level")]
    pub level: String,
    #[serde(
        alias = "dificultad",
        default = "default_difficulty",
        deserialize_with = "scalar_string"
    )]
    pub difficulty: String,
    #[serde(alias = "tiempo_estimado", default = "default_minutes")]
    pub estimated_minutes: f64,
    #[serde(alias = "procedencia", default)]
    pub source: String,
    #[serde(alias = "visibilidad", default = "default_visibility")]
    pub visibility: String,
    #[serde(alias = "libros", default, deserialize_with = "string_list")]
    pub books: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub tags: Vec<String>,
    #[serde(alias = "enunciado", default)]
    pub statement: String,
    #[serde(alias = "solucion", default)]
    pub solution: String,
    #[serde(alias = "archivo_origen", default, skip_serializing_if = "Option::is_none")]
    pub origin_file: Option<String>,
    #[serde(alias = "institucion", default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    #[serde(
        alias = "año",
        default,
        deserialize_with = "optional_scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub year: Option<String>,
    #[serde(
        alias = "periodo",
        default,
        deserialize_with = "optional_scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub period: Option<String>,
    #[serde(alias = "tipo_examen", default, skip_serializing_if = "Option::is_none")]
    pub exam_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub youtube_url: Option<String>,
    #[serde(alias = "mostrar_solucion", default, skip_serializing_if = "Option::is_none")]
    pub show_solution: Option<bool>,
    #[serde(alias = "libro_promocion", default, skip_serializing_if = "Option::is_none")]
    pub promoted_book: Option<serde_json::Value>,
}

fn default_level() -> String {
    "basico".into()
}

fn default_difficulty() -> String {
    "2".into()
}

fn default_minutes() -> f64 {
    5.0
}

fn default_visibility() -> String {
    "web_impreso".into()
}

/// Accepts a string, integer, float or bool and keeps its textual form.
fn scalar_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    match serde_json::Value::deserialize(d)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        other => Err(de::Error::custom(format!("expected a scalar, got {}", other))),
    }
}

fn optional_scalar_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    match serde_json::Value::deserialize(d)? {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) if s.is_empty() => Ok(None),
        serde_json::Value::String(s) => Ok(Some(s)),
        serde_json::Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(de::Error::custom(format!("expected a scalar, got {}", other))),
    }
}

/// A list of scalars, a single string, or null.
pub(crate) fn string_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    struct ListVisitor;

    impl<'de> Visitor<'de> for ListVisitor {
        type Value = Vec<String>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a string or a list of strings")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            if v.trim().is_empty() {
                Ok(Vec::new())
            } else {
                Ok(vec![v.to_string()])
            }
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut out = Vec::new();
            while let Some(item) = seq.next_element::<serde_json::Value>()? {
                match item {
                    serde_json::Value::String(s) => out.push(s),
                    serde_json::Value::Null => {}
                    other => out.push(other.to_string()),
                }
            }
            Ok(out)
        }
    }

    d.deserialize_any(ListVisitor)
}
