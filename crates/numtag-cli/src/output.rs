use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use numtag_core::{
    DocumentExtraction, ModelRegistry, PageOutcome, PageStatus, ProgressEvent, SyntaxLabel,
};
use owo_colors::OwoColorize;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

/// Print the extraction summary after PDF parsing.
pub fn print_extraction_summary(
    w: &mut dyn Write,
    pdf_name: &str,
    extraction: &DocumentExtraction,
    pages_to_label: usize,
    color: ColorMode,
) -> std::io::Result<()> {
    writeln!(w, "Extracting numeric tokens from {}...", pdf_name)?;
    writeln!(
        w,
        "Found {} tokens on {} of {} pages",
        extraction.records.len(),
        pages_to_label,
        extraction.page_count()
    )?;

    let mut by_label: BTreeMap<&str, usize> = BTreeMap::new();
    for record in &extraction.records {
        *by_label.entry(record.syntax_label.as_str()).or_default() += 1;
    }
    if !by_label.is_empty() {
        let breakdown = by_label
            .iter()
            .map(|(label, n)| format!("{} {}", n, label))
            .collect::<Vec<_>>()
            .join(", ");
        if color.enabled() {
            writeln!(w, "{}", format!("({})", breakdown).dimmed())?;
        } else {
            writeln!(w, "({})", breakdown)?;
        }
    }
    writeln!(w)?;
    Ok(())
}

/// Print every token grouped by page, without calling the model.
pub fn print_dry_run(
    w: &mut dyn Write,
    pdf_name: &str,
    extraction: &DocumentExtraction,
    color: ColorMode,
) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(
            w,
            "{} {} ({} tokens)\n",
            "DRY RUN:".bold().cyan(),
            pdf_name.bold(),
            extraction.records.len()
        )?;
    } else {
        writeln!(
            w,
            "DRY RUN: {} ({} tokens)\n",
            pdf_name,
            extraction.records.len()
        )?;
    }

    let mut current_page = None;
    for record in &extraction.records {
        if current_page != Some(record.page_number) {
            current_page = Some(record.page_number);
            if color.enabled() {
                writeln!(w, "{}", format!("Page {}", record.page_number).bold())?;
            } else {
                writeln!(w, "Page {}", record.page_number)?;
            }
        }
        let context: String = record.context.split_whitespace().collect::<Vec<_>>().join(" ");
        let label = format!("{:<22}", record.syntax_label.as_str());
        if color.enabled() {
            writeln!(
                w,
                "  {:<12} {} {}",
                record.value,
                colored_label(record.syntax_label, &label),
                context.dimmed()
            )?;
        } else {
            writeln!(w, "  {:<12} {} {}", record.value, label, context)?;
        }
    }
    Ok(())
}

fn colored_label(label: SyntaxLabel, text: &str) -> String {
    match label {
        SyntaxLabel::Monetary | SyntaxLabel::Percentage | SyntaxLabel::PerformanceMultiplier => {
            text.green().to_string()
        }
        SyntaxLabel::Date | SyntaxLabel::TimePeriod => text.cyan().to_string(),
        SyntaxLabel::GrantedUnits => text.magenta().to_string(),
        SyntaxLabel::Unknown => text.dimmed().to_string(),
        _ => text.yellow().to_string(),
    }
}

/// Render a progress event as a line for the terminal, if it warrants one.
pub fn format_progress(event: &ProgressEvent, color: ColorMode) -> Option<String> {
    match event {
        ProgressEvent::PageStarted { .. } => None,
        ProgressEvent::PageCompleted {
            page_number,
            completed,
            total,
            status,
            elapsed,
            message,
        } => {
            let prefix = format!("[{}/{}] page {}", completed, total, page_number);
            let (tag, detail) = match status {
                PageStatus::Labeled => ("LABELED", format!("({:.1?})", elapsed)),
                PageStatus::Unparsed => (
                    "UNPARSED",
                    format!("({})", message.as_deref().unwrap_or("not a JSON object")),
                ),
                PageStatus::Failed => (
                    "FAILED",
                    format!("({})", message.as_deref().unwrap_or("unknown error")),
                ),
            };
            if color.enabled() {
                let tag = match status {
                    PageStatus::Labeled => tag.green().to_string(),
                    PageStatus::Unparsed => tag.yellow().to_string(),
                    PageStatus::Failed => tag.red().to_string(),
                };
                Some(format!("{} -> {} {}", prefix, tag, detail.dimmed()))
            } else {
                Some(format!("{} -> {} {}", prefix, tag, detail))
            }
        }
        ProgressEvent::Reconciliation {
            page_number,
            expected,
            returned,
            missing,
        } => {
            let message = format!(
                "page {}: model returned {} results for {} values; missing {}",
                page_number,
                returned,
                expected,
                missing.join(", ")
            );
            if color.enabled() {
                Some(format!("{} {}", "WARNING:".yellow(), message))
            } else {
                Some(format!("WARNING: {}", message))
            }
        }
    }
}

/// Print the final per-status counts.
pub fn print_summary(
    w: &mut dyn Write,
    outcomes: &[PageOutcome],
    output_path: &Path,
    color: ColorMode,
) -> std::io::Result<()> {
    let count = |status: PageStatus| outcomes.iter().filter(|o| o.status() == status).count();
    let labeled = count(PageStatus::Labeled);
    let unparsed = count(PageStatus::Unparsed);
    let failed = count(PageStatus::Failed);
    let (labeled_values, gaps) = outcomes.iter().fold((0, 0), |(values, gaps), o| match o {
        PageOutcome::Labeled {
            results,
            reconciliation,
            ..
        } => (values + results.len(), gaps + reconciliation.missing.len()),
        _ => (values, gaps),
    });

    writeln!(w)?;
    if color.enabled() {
        writeln!(w, "{}", "═".repeat(60).bold())?;
        writeln!(w, "{}", "SUMMARY".bold())?;
        writeln!(w, "{}", "═".repeat(60).bold())?;
        writeln!(w, "  Pages labeled:   {}", labeled.to_string().green())?;
        writeln!(w, "  Pages unparsed:  {}", unparsed.to_string().yellow())?;
        writeln!(w, "  Pages failed:    {}", failed.to_string().red())?;
    } else {
        writeln!(w, "{}", "=".repeat(60))?;
        writeln!(w, "SUMMARY")?;
        writeln!(w, "{}", "=".repeat(60))?;
        writeln!(w, "  Pages labeled:   {}", labeled)?;
        writeln!(w, "  Pages unparsed:  {}", unparsed)?;
        writeln!(w, "  Pages failed:    {}", failed)?;
    }
    writeln!(w, "  Values labeled:  {}", labeled_values)?;
    if gaps > 0 {
        writeln!(w, "  Values missing:  {}", gaps)?;
    }
    writeln!(w)?;
    writeln!(w, "Results written to {}", output_path.display())?;
    Ok(())
}

/// List the configured models.
pub fn print_models(
    w: &mut dyn Write,
    registry: &ModelRegistry,
    default_model: &str,
    color: ColorMode,
) -> std::io::Result<()> {
    for (name, endpoint) in registry.iter() {
        let marker = if name == default_model { "*" } else { " " };
        if color.enabled() {
            writeln!(
                w,
                "{} {:<12} {} {}",
                marker,
                name.bold(),
                endpoint.model_id,
                endpoint.base_url.dimmed()
            )?;
        } else {
            writeln!(
                w,
                "{} {:<12} {} {}",
                marker, name, endpoint.model_id, endpoint.base_url
            )?;
        }
    }
    Ok(())
}
