use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use fc_app::{
    AppError, AppResult, PolarizationModel, ProgressFile, StudyProgressEvent, StudyRequest,
    StudyStage, query, settings_service, study_service,
};
use fc_results::{ResultTable, StudyStore};
use fc_settings::{SettingsCodec, save_settings};
use fc_study::{StudyMode, StudyPlan, load_plan};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fc-cli")]
#[command(
    about = "fcstudy CLI - Fuel-cell parameter studies against the built-in polarization model",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a parameter study
    Study {
        /// Base settings file (YAML or JSON)
        settings_path: PathBuf,
        /// Study plan file (YAML or JSON)
        plan_path: PathBuf,
        /// Override the plan's expansion mode (single or full)
        #[arg(long)]
        mode: Option<StudyMode>,
        /// Append the nominal row to the batch
        #[arg(long)]
        keep_nominal: bool,
        /// Compute a polarization curve for every study row
        #[arg(long)]
        curve: bool,
        /// Run rows in parallel
        #[arg(long)]
        parallel: bool,
        /// Drop failed rows from the result table
        #[arg(long)]
        drop_failed: bool,
        /// Settings override, `path=value` (repeatable)
        #[arg(long = "set", value_name = "PATH=VALUE")]
        overrides: Vec<String>,
        /// Address list elements as `name-0`, `name-1`
        #[arg(long)]
        legacy_keys: bool,
        /// Append progress percentages to this file
        #[arg(long)]
        progress_file: Option<PathBuf>,
        /// Also export the result table to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Do not store the study next to the settings file
        #[arg(long)]
        no_save: bool,
        /// Write the plan, with flag overrides applied, to this file
        #[arg(long)]
        save_plan: Option<PathBuf>,
    },
    /// Run the nominal configuration once
    Single {
        /// Base settings file (YAML or JSON)
        settings_path: PathBuf,
        /// Settings override, `path=value` (repeatable)
        #[arg(long = "set", value_name = "PATH=VALUE")]
        overrides: Vec<String>,
    },
    /// List stored studies
    List {
        /// Base settings file the studies belong to
        settings_path: PathBuf,
    },
    /// Show a stored study
    Show {
        /// Base settings file the study belongs to
        settings_path: PathBuf,
        /// Study ID
        study_id: String,
        /// Show global and local results of one row
        #[arg(long)]
        row: Option<usize>,
        /// Print one local result of the selected row
        #[arg(long, requires = "row")]
        local: Option<String>,
        /// Entry of a grouped local result
        #[arg(long, requires = "local")]
        sub: Option<String>,
    },
    /// Export polarization curves of a stored study as CSV
    Curve {
        /// Base settings file the study belongs to
        settings_path: PathBuf,
        /// Study ID
        study_id: String,
        /// Global result plotted over current density
        #[arg(long, default_value = "Average Cell Voltage")]
        response: String,
        /// Flat settings key of the operating current density
        #[arg(long, default_value = "simulation-current_density")]
        current_density_path: String,
        /// Output CSV file path (optional, defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Export a stored study's result table to a transport file
    Export {
        /// Base settings file the study belongs to
        settings_path: PathBuf,
        /// Study ID
        study_id: String,
        /// Output file
        output: PathBuf,
    },
    /// Summarize an exported result table
    Inspect {
        /// Transport file written by `study --output` or `export`
        table_path: PathBuf,
    },
    /// Print the flat key space of a settings file
    Flatten {
        /// Settings file (YAML or JSON)
        settings_path: PathBuf,
        /// Address list elements as `name-0`, `name-1`
        #[arg(long)]
        legacy_keys: bool,
    },
    /// Write the settings the built-in model understands
    DemoSettings {
        /// Output file (YAML or JSON)
        output: PathBuf,
    },
    /// Print the percentage recorded in a progress file
    Progress {
        /// Progress file written by `study --progress-file`
        path: PathBuf,
    },
}

fn main() -> AppResult<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Study {
            settings_path,
            plan_path,
            mode,
            keep_nominal,
            curve,
            parallel,
            drop_failed,
            overrides,
            legacy_keys,
            progress_file,
            output,
            no_save,
            save_plan,
        } => {
            let mut plan = load_plan(&plan_path)?;
            if let Some(mode) = mode {
                plan.mode = mode;
            }
            plan.keep_nominal |= keep_nominal;
            plan.curve.enabled |= curve;
            plan.execution.parallel |= parallel;
            if drop_failed {
                plan.execution.return_unsuccessful = false;
            }
            if let Some(path) = &save_plan {
                fc_study::save_plan(path, &plan)?;
                println!("✓ Wrote plan to {}", path.display());
            }
            cmd_study(
                &settings_path,
                &plan,
                &overrides,
                codec(legacy_keys),
                progress_file.as_deref(),
                output.as_deref(),
                !no_save,
            )
        }
        Commands::Single {
            settings_path,
            overrides,
        } => cmd_single(&settings_path, &overrides),
        Commands::List { settings_path } => cmd_list(&settings_path),
        Commands::Show {
            settings_path,
            study_id,
            row,
            local,
            sub,
        } => cmd_show(
            &settings_path,
            &study_id,
            row,
            local.as_deref(),
            sub.as_deref(),
        ),
        Commands::Curve {
            settings_path,
            study_id,
            response,
            current_density_path,
            output,
        } => cmd_curve(
            &settings_path,
            &study_id,
            &response,
            &current_density_path,
            output.as_deref(),
        ),
        Commands::Export {
            settings_path,
            study_id,
            output,
        } => cmd_export(&settings_path, &study_id, &output),
        Commands::Inspect { table_path } => cmd_inspect(&table_path),
        Commands::Flatten {
            settings_path,
            legacy_keys,
        } => cmd_flatten(&settings_path, codec(legacy_keys)),
        Commands::DemoSettings { output } => {
            save_settings(&output, &fc_app::demo_settings())?;
            println!("✓ Wrote demo settings to {}", output.display());
            Ok(())
        }
        Commands::Progress { path } => {
            println!("{}%", fc_app::read_progress_percent(&path));
            Ok(())
        }
    }
}

fn codec(legacy_keys: bool) -> SettingsCodec {
    if legacy_keys {
        SettingsCodec::legacy()
    } else {
        SettingsCodec::default()
    }
}

fn load_settings_with_overrides(
    settings_path: &Path,
    overrides: &[String],
    codec: &SettingsCodec,
) -> AppResult<fc_settings::SettingsTree> {
    let settings = settings_service::load_base_settings(settings_path)?;
    if overrides.is_empty() {
        return Ok(settings);
    }
    let flat = settings_service::parse_overrides(overrides)?;
    settings_service::apply_overrides(&settings, codec, &flat)
}

fn cmd_study(
    settings_path: &Path,
    plan: &StudyPlan,
    overrides: &[String],
    codec: SettingsCodec,
    progress_path: Option<&Path>,
    output: Option<&Path>,
    save: bool,
) -> AppResult<()> {
    let settings = load_settings_with_overrides(settings_path, overrides, &codec)?;
    println!(
        "Running {} study '{}' ({} variation records{})",
        plan.mode,
        plan.name,
        plan.variations.len(),
        if plan.curve.enabled { ", curves" } else { "" }
    );

    let mut progress_file = progress_path.map(ProgressFile::create).transpose()?;
    let request = StudyRequest {
        settings: &settings,
        plan,
        codec,
    };

    let mut last_emit = Instant::now();
    let mut last_stage = None;
    let response = study_service::run_study_with_progress(
        &PolarizationModel,
        &request,
        Some(&mut |event| {
            if let Some(file) = progress_file.as_mut()
                && let Err(err) = file.record(&event)
            {
                tracing::warn!(error = %err, "failed to write progress file");
            }
            let emit_now = last_stage != Some(event.stage) || last_emit.elapsed().as_millis() >= 100;
            if emit_now {
                render_cli_progress(&event);
                last_stage = Some(event.stage);
                last_emit = Instant::now();
            }
        }),
    )?;
    clear_progress_line();

    let summary = query::table_summary(&response.table);
    println!("✓ Study completed: {}", response.study_id);
    println!(
        "  Rows: {} ({} successful)",
        summary.rows, summary.successful
    );
    if !response.unreachable_bases.is_empty() {
        println!(
            "  Unreachable curve bases: {:?}",
            response.unreachable_bases
        );
    }
    for miss in &response.lookup_misses {
        println!("  Warning: {}", miss);
    }
    println!(
        "  Timing: total={:.3}s expand={:.3}s run={:.3}s calls={}",
        response.timing.total_time_s,
        response.timing.expand_time_s,
        response.timing.run_time_s,
        response.timing.simulation_calls
    );

    if save {
        let store = StudyStore::for_settings(settings_path)?;
        study_service::save_study(&store, plan, &response)?;
        println!("  Stored in {}", store.root_dir().display());
    }
    if let Some(path) = output {
        fc_results::export_table(path, &response.table)?;
        println!("  Exported table to {}", path.display());
    }
    Ok(())
}

fn cmd_single(settings_path: &Path, overrides: &[String]) -> AppResult<()> {
    let codec = SettingsCodec::default();
    let settings = load_settings_with_overrides(settings_path, overrides, &codec)?;
    let table = study_service::run_single(&PolarizationModel, &settings, &codec, None)?;
    let Some(row) = table.rows.first() else {
        return Err(AppError::Simulation("no row was run".to_string()));
    };
    if let Some(msg) = row.failure() {
        return Err(AppError::Simulation(msg.to_string()));
    }
    print_row(row);
    Ok(())
}

fn cmd_list(settings_path: &Path) -> AppResult<()> {
    let store = StudyStore::for_settings(settings_path)?;
    let studies = study_service::list_studies(&store)?;

    if studies.is_empty() {
        println!("No stored studies");
    } else {
        println!("Stored studies:");
        for m in studies {
            println!(
                "  {} - {} ({}, {} rows, {} successful{}) {}",
                m.study_id,
                m.name,
                m.mode,
                m.row_count,
                m.successful_rows,
                if m.curve { ", curves" } else { "" },
                m.timestamp
            );
        }
    }
    Ok(())
}

fn cmd_show(
    settings_path: &Path,
    study_id: &str,
    row: Option<usize>,
    local: Option<&str>,
    sub: Option<&str>,
) -> AppResult<()> {
    let store = StudyStore::for_settings(settings_path)?;
    let (manifest, table) = study_service::load_study(&store, study_id)?;

    let Some(index) = row else {
        println!("Study: {} ({})", manifest.study_id, manifest.name);
        println!("  Timestamp: {}", manifest.timestamp);
        println!("  Mode: {}", manifest.mode);
        print_table_overview(&table);
        return Ok(());
    };

    let row = table
        .rows
        .get(index)
        .ok_or_else(|| AppError::InvalidInput(format!("Row {} out of range", index)))?;
    match local {
        None => print_row(row),
        Some(key) => {
            let data = row.local_data().ok_or_else(|| {
                AppError::InvalidInput(format!("Row {} has no results", index))
            })?;
            let view = query::extract_local_series(data, key, sub)?;
            println!("{} [{}]", view.name, view.units);
            if let Some((xkey, x)) = &view.x {
                println!("  {}: {}", xkey, join(x));
            }
            for (i, values) in view.rows.iter().enumerate() {
                println!("  [{}]: {}", i, join(values));
            }
        }
    }
    Ok(())
}

fn cmd_curve(
    settings_path: &Path,
    study_id: &str,
    response: &str,
    current_density_path: &str,
    output: Option<&Path>,
) -> AppResult<()> {
    let store = StudyStore::for_settings(settings_path)?;
    let (_manifest, table) = study_service::load_study(&store, study_id)?;
    let curves = query::polarization_curves(&table, current_density_path, response);
    if curves.is_empty() {
        return Err(AppError::InvalidInput(
            "Study has no polarization curve rows".to_string(),
        ));
    }

    // Build CSV
    let mut csv = String::from("curve,current_density,value\n");
    for curve in &curves {
        for (i, value) in &curve.points {
            csv.push_str(&format!("\"{}\",{},{}\n", curve.label, i, value));
        }
    }

    // Write to file or stdout
    if let Some(path) = output {
        std::fs::write(path, csv)?;
        println!(
            "✓ Exported {} curves to {}",
            curves.len(),
            path.display()
        );
    } else {
        print!("{}", csv);
    }
    Ok(())
}

fn cmd_export(settings_path: &Path, study_id: &str, output: &Path) -> AppResult<()> {
    let store = StudyStore::for_settings(settings_path)?;
    let (_manifest, table) = study_service::load_study(&store, study_id)?;
    fc_results::export_table(output, &table)?;
    println!("✓ Exported {} rows to {}", table.len(), output.display());
    Ok(())
}

fn cmd_inspect(table_path: &Path) -> AppResult<()> {
    let table = fc_results::import_table(table_path)?;
    print_table_overview(&table);
    Ok(())
}

fn cmd_flatten(settings_path: &Path, codec: SettingsCodec) -> AppResult<()> {
    let settings = settings_service::load_base_settings(settings_path)?;
    for (key, value) in codec.flatten(&settings) {
        println!("{} = {}", key, value);
    }
    Ok(())
}

fn print_table_overview(table: &ResultTable) {
    let summary = query::table_summary(table);
    println!("  Rows: {} ({} successful)", summary.rows, summary.successful);
    println!("  Variations: {}", summary.variation_parameters.join(" | "));
    for row in table.iter() {
        let status = match row.failure() {
            None => "ok".to_string(),
            Some(msg) => format!("failed: {}", msg),
        };
        let current = row
            .config
            .operating_current_density
            .map(|i| format!("  i={:.1}", i))
            .unwrap_or_default();
        println!(
            "  [{}] {}{}  {}",
            row.index,
            row.variation_parameter().unwrap_or("nominal"),
            current,
            status
        );
    }
}

fn print_row(row: &fc_results::StudyRow) {
    if let Some(msg) = row.failure() {
        println!("Row {} failed: {}", row.index, msg);
        return;
    }
    if let Some(global) = row.global_data() {
        println!("{:<28} {:>12}  Units", "Quantity", "Value");
        for line in query::global_table(global) {
            println!("{:<28} {:>12}  {}", line.quantity, line.value, line.units);
        }
    }
    if let Some(local) = row.local_data() {
        println!("Local results: {}", query::local_keys(local).join(", "));
        println!("Heatmaps: {}", query::heatmap_keys(local).join(", "));
    }
}

fn join(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| format!("{:.4e}", v))
        .collect::<Vec<_>>()
        .join(", ")
}

fn clear_progress_line() {
    print!("\r{}\r", " ".repeat(120));
    let _ = io::stdout().flush();
}

fn render_cli_progress(event: &StudyProgressEvent) {
    match event.stage {
        StudyStage::RunningRows | StudyStage::SearchingCurve | StudyStage::RefiningCurve
            if event.total > 0 =>
        {
            let width = 28usize;
            let filled = ((event.fraction() * width as f64).round() as usize).min(width);
            let bar = format!(
                "{}{}",
                "#".repeat(filled),
                "-".repeat(width.saturating_sub(filled))
            );
            let mut line = format!(
                "\r[{}] {:>3}%  phase={}  {}/{}  elapsed={:.1}s",
                bar,
                event.percent(),
                event.stage.label(),
                event.completed,
                event.total,
                event.elapsed_wall_s
            );
            if let Some(msg) = &event.message {
                line.push_str(&format!("  {}", msg));
            }
            print!("{}", line);
            let _ = io::stdout().flush();
        }
        _ => {
            let spinner = ['|', '/', '-', '\\'];
            let spin_idx = ((event.elapsed_wall_s * 10.0) as usize) % spinner.len();
            let mut line = format!(
                "\r{} {}  elapsed={:.2}s",
                spinner[spin_idx],
                event.stage.label(),
                event.elapsed_wall_s
            );
            if let Some(msg) = &event.message {
                line.push_str(&format!("  {}", msg));
            }
            print!("{}", line);
            let _ = io::stdout().flush();
        }
    }
}
