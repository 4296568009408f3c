use std::collections::BTreeMap;

use serde::Serialize;

use crate::catalog::types::Exercise;

/// Aggregate counters over the exercise corpus for the admin dashboard.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct CatalogStats {
    pub total: usize,
    pub by_subject: BTreeMap<String, usize>,
    pub by_code_level: BTreeMap<String, usize>,
    pub by_difficulty: BTreeMap<String, usize>,
    pub avg_minutes_by_subject: BTreeMap<String, f64>,
    pub by_source: BTreeMap<String, usize>,
    pub by_visibility: BTreeMap<String, usize>,
}

fn or_label<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

fn bump(map: &mut BTreeMap<String, usize>, key: &str) {
    *map.entry(key.to_string()).or_default() += 1;
}

impl CatalogStats {
    pub fn compute(exercises: &[Exercise]) -> Self {
        let mut stats = CatalogStats {
            total: exercises.len(),
            ..Default::default()
        };
        let mut times: BTreeMap<String, (f64, usize)> = BTreeMap::new();

        for ex in exercises {
            let code = or_label(&ex.subject_code, "SIN_CODIGO");
            let level = or_label(&ex.level, "sin_nivel");

            bump(&mut stats.by_subject, code);
            bump(&mut stats.by_code_level, &format!("{}_{}", code, level));
            bump(&mut stats.by_difficulty, &ex.difficulty);
            bump(&mut stats.by_source, or_label(&ex.source, "Sin procedencia"));
            bump(&mut stats.by_visibility, or_label(&ex.visibility, "sin_visibilidad"));

            let slot = times.entry(code.to_string()).or_insert((0.0, 0));
            if ex.estimated_minutes > 0.0 {
                slot.0 += ex.estimated_minutes;
                slot.1 += 1;
            }
        }

        stats.avg_minutes_by_subject = times
            .into_iter()
            .map(|(code, (sum, n))| {
                let avg = if n == 0 {
                    0.0
                } else {
                    (sum / n as f64 * 10.0).round() / 10.0
                };
                (code, avg)
            })
            .collect();
        stats
    }
}
