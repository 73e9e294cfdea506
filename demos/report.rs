use cisyn::prelude::batch::*;
use cisyn::prelude::fit::{BootstrapOptions, FitOptions, ModelType};
use cisyn::DoseResponseTable;

const TABLE: &str = "#Treatment\tDose\tEffect
Lapatinib\t0.1|0.3|1|3|10\t0.08|0.21|0.45|0.71|0.9
Erlotinib\t0.1|0.3|1|3|10\t0.05|0.12|0.31|0.58|0.8
Lapatinib-Erlotinib\t0.1-0.1|0.3-0.3|1-1\t0.25|0.55|0.82
";

fn main() -> anyhow::Result<()> {
    let table = match std::env::args().nth(1) {
        Some(path) => DoseResponseTable::from_path(path)?,
        None => DoseResponseTable::from_reader(TABLE.as_bytes())?,
    };

    for model_type in [ModelType::LogLinear, ModelType::Logistic3] {
        let options = ReportOptions::default()
            .with_model_type(model_type)
            .with_fit_options(
                FitOptions::default()
                    .with_bootstrap(BootstrapOptions::default().with_samples(200).with_seed(22)),
            )
            .with_scheduler(SchedulerOptions::default().with_progress(true));

        let report = run_report(&table, &options)?;
        println!("# {}", model_type);
        print!("{}", report.to_tsv_string()?);

        for job in report.jobs.failed() {
            println!("failed {}: {}", job.name(), job.error().unwrap_or(""));
        }
        for skipped in &report.skipped {
            println!("skipped: {}", skipped);
        }
    }

    Ok(())
}
