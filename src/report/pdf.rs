use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use printpdf::*;

use super::{ReportError, ReportRenderer, DISCLAIMER};
use crate::config::APP_NAME;
use crate::models::Diagnosis;

/// Writes one A4 PDF per rendered diagnosis into the reports directory.
pub struct PdfReportGateway {
    reports_dir: PathBuf,
}

impl PdfReportGateway {
    pub fn new(reports_dir: impl Into<PathBuf>) -> Self {
        Self {
            reports_dir: reports_dir.into(),
        }
    }

    pub fn reports_dir(&self) -> &Path {
        &self.reports_dir
    }
}

impl ReportRenderer for PdfReportGateway {
    fn render(&self, patient_id: &str, diagnosis: &Diagnosis) -> Result<PathBuf, ReportError> {
        if diagnosis.patient_id != patient_id {
            return Err(ReportError::PatientMismatch {
                patient_id: patient_id.to_string(),
                diagnosis_id: diagnosis.id.clone(),
            });
        }

        let generated_at = chrono::Local::now().naive_local();
        let bytes = diagnosis_pdf(patient_id, diagnosis, generated_at)?;

        std::fs::create_dir_all(&self.reports_dir)?;
        let path = self
            .reports_dir
            .join(report_file_name(patient_id, &diagnosis.id, generated_at));
        std::fs::write(&path, bytes)?;

        tracing::info!(
            patient_id,
            diagnosis_id = %diagnosis.id,
            path = %path.display(),
            "Report written"
        );
        Ok(path)
    }
}

/// `report_<patient>_<YYYYmmdd_HHMMSS>_<diagnosis>.pdf`
pub fn report_file_name(patient_id: &str, diagnosis_id: &str, at: NaiveDateTime) -> String {
    format!(
        "report_{}_{}_{}.pdf",
        patient_id,
        at.format("%Y%m%d_%H%M%S"),
        diagnosis_id
    )
}

/// Lays out the diagnosis report. Returns PDF bytes.
pub fn diagnosis_pdf(
    patient_id: &str,
    diagnosis: &Diagnosis,
    generated_at: NaiveDateTime,
) -> Result<Vec<u8>, ReportError> {
    let title = format!("{APP_NAME} - Chest X-ray Triage Report");
    let (doc, page1, layer1) = PdfDocument::new(&title, Mm(210.0), Mm(297.0), "Layer 1");
    let layer = doc.get_page(page1).get_layer(layer1);
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| ReportError::Pdf(format!("font error: {e}")))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| ReportError::Pdf(format!("font error: {e}")))?;

    let mut y = Mm(280.0);

    layer.use_text(&title, 14.0, Mm(20.0), y, &bold);
    y -= Mm(8.0);
    layer.use_text(
        format!("Date: {}", generated_at.format("%d/%m/%Y %H:%M:%S")),
        9.0,
        Mm(20.0),
        y,
        &font,
    );
    y -= Mm(5.0);
    layer.use_text(format!("Patient code: {patient_id}"), 9.0, Mm(20.0), y, &font);
    y -= Mm(5.0);
    layer.use_text(format!("Diagnosis: {}", diagnosis.id), 9.0, Mm(20.0), y, &font);
    y -= Mm(12.0);

    layer.use_text("RESULT:", 11.0, Mm(20.0), y, &bold);
    y -= Mm(7.0);
    let rows = [
        format!("Classification: {}", diagnosis.classification),
        format!("Pneumonia probability: {:.2}%", diagnosis.confidence * 100.0),
        format!("Priority: {}", diagnosis.priority),
        format!("Recorded: {} by {}", diagnosis.timestamp.format("%d/%m/%Y %H:%M"), diagnosis.created_by),
    ];
    for row in &rows {
        layer.use_text(row, 10.0, Mm(25.0), y, &font);
        y -= Mm(5.5);
    }

    if let Some(image) = &diagnosis.image_reference {
        for line in wrap_text(&format!("Image: {image}"), 85) {
            layer.use_text(&line, 8.0, Mm(25.0), y, &font);
            y -= Mm(4.5);
        }
    }

    if let Some(notes) = diagnosis.notes.as_deref().filter(|n| !n.trim().is_empty()) {
        y -= Mm(6.0);
        layer.use_text("NOTES:", 11.0, Mm(20.0), y, &bold);
        y -= Mm(6.0);
        for line in wrap_text(notes, 80) {
            layer.use_text(&line, 9.0, Mm(25.0), y, &font);
            y -= Mm(4.5);
        }
    }

    y -= Mm(10.0);
    layer.use_text("DISCLAIMER", 9.0, Mm(20.0), y, &bold);
    y -= Mm(5.0);
    for line in wrap_text(DISCLAIMER, 90) {
        layer.use_text(&line, 8.0, Mm(20.0), y, &font);
        y -= Mm(4.0);
    }

    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf)
        .map_err(|e| ReportError::Pdf(format!("save error: {e}")))?;
    buf.into_inner()
        .map_err(|e| ReportError::Pdf(format!("buffer error: {e}")))
}

/// Simple word-wrap helper for PDF text rendering.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.len() + word.len() + 1 > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
