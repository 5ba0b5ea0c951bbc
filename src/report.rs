// 🖨️ Printable record - plain-text physiotherapy report for one clinical record

use crate::auth::UserProfile;
use crate::entities::{ClinicalRecord, Patient};
use crate::forms::format_date;

pub const CLINIC_NAME: &str = "Clínica FisioGest";
const RULE: &str = "────────────────────────────────────────────────────────────";

/// Render `record` as a report ready to print or save.
///
/// Structured initial assessments list every filled field followed by the
/// summary as an addendum; other records print the summary alone. The
/// signature block uses the logged-in `signer` and falls back to the record's
/// author.
pub fn printable_record(
    record: &ClinicalRecord,
    patient: Option<&Patient>,
    signer: Option<&UserProfile>,
) -> String {
    let mut lines = vec![
        CLINIC_NAME.to_string(),
        "Relatório Fisioterapêutico".to_string(),
        format!("Data: {}", format_date(record.date)),
        record.kind.as_str().to_string(),
        RULE.to_string(),
        format!("Paciente: {}", record.patient),
    ];

    let clinical = match patient {
        Some(p) if !p.pathology.trim().is_empty() => format!("{} anos | {}", p.age, p.pathology),
        Some(p) => format!("{} anos | Patologia não informada", p.age),
        None => "Patologia não informada".to_string(),
    };
    lines.push(format!("Dados Clínicos: {}", clinical));
    lines.push(RULE.to_string());

    match record.assessment.as_ref().filter(|_| record.has_assessment()) {
        Some(assessment) => {
            for (label, value) in assessment.fields() {
                if let Some(value) = value {
                    lines.push(format!("{}:", label));
                    lines.push(format!("  {}", value));
                }
            }
            if !record.summary.trim().is_empty() {
                lines.push("Resumo/Adendos:".to_string());
                lines.push(format!("  {}", record.summary));
            }
        }
        None => {
            lines.push("Resumo Clínico:".to_string());
            lines.push(format!("  {}", record.summary));
        }
    }

    lines.push(String::new());
    lines.push("________________________________".to_string());
    lines.push(signer.map_or(record.author.clone(), |u| u.name.clone()));
    let license = signer
        .map(|u| u.license.trim())
        .filter(|l| !l.is_empty())
        .unwrap_or("Não informado");
    lines.push(format!("CREFITO {}", license));

    let mut text = lines.join("\n");
    text.push('\n');
    text
}
