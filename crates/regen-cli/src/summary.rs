use console::Style;
use regen_core::reconstruct::config::JobConfig;
use regen_core::reconstruct::{BatchReport, JobStatus, JobSummary};

struct Styles {
    title: Style,
    label: Style,
    value: Style,
    ok: Style,
    skipped: Style,
    failed: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            ok: Style::new().green(),
            skipped: Style::new().dim().yellow(),
            failed: Style::new().red().bold(),
            path: Style::new().underlined(),
        }
    }
}

pub fn print_job_config(config: &JobConfig) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Frame Reconstruction"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(20)));
    println!();

    for (source, path) in config.inputs.sources() {
        println!(
            "  {:<14}{}",
            s.label.apply_to(source.to_string()),
            s.path.apply_to(path.display())
        );
    }
    println!(
        "  {:<14}{}",
        s.label.apply_to("Output"),
        s.path.apply_to(config.output.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Geometry"),
        s.value
            .apply_to(format!("{}x{}", config.geometry.width, config.geometry.height))
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Layout"),
        s.value.apply_to(&config.inputs)
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Chunk"),
        s.value.apply_to(format!("{} rows", config.reader.chunk_size))
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Samples"),
        s.value.apply_to(config.reader.sample_policy)
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Format"),
        s.value.apply_to(config.emit.format)
    );
    println!();
}

pub fn print_job_summary(summary: &JobSummary) {
    let s = Styles::new();

    println!();
    println!(
        "  {} {} frame(s) of {}x{} saved to {}",
        s.ok.apply_to("Done:"),
        s.value.apply_to(summary.frames),
        summary.width,
        summary.height,
        s.path.apply_to(summary.output_dir.display())
    );
    if summary.samples_out_of_range > 0 {
        println!(
            "  {} {} sample(s) were outside [0, 255]",
            s.skipped.apply_to("Note:"),
            summary.samples_out_of_range
        );
    }
}

pub fn print_batch_report(report: &BatchReport) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Batch Report"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(12)));
    println!();

    for outcome in &report.outcomes {
        let status = match &outcome.status {
            JobStatus::Completed(summary) => s.ok.apply_to(format!(
                "{} frame(s) in {}",
                summary.frames,
                summary.output_dir.display()
            )),
            JobStatus::Skipped { missing } => {
                s.skipped
                    .apply_to(format!("skipped, {} not found", missing.display()))
            }
            JobStatus::Failed(e) => s.failed.apply_to(format!("failed: {e}")),
            JobStatus::Cancelled => s.skipped.apply_to("cancelled".to_string()),
        };
        println!("  {:<14}{}", s.label.apply_to(&outcome.name), status);
    }

    println!();
    println!(
        "  {:<14}{} completed, {} skipped, {} failed",
        s.label.apply_to("Total"),
        s.value.apply_to(report.completed()),
        report.skipped(),
        report.failed()
    );
}
