// Entry point and interactive CLI flow.
//
// - Option [1] loads every CSV named in the configuration.
// - Option [2] builds the dashboard, writes one CSV per report plus a JSON
//   summary, and prints a Markdown preview of each table.
// - After generating reports, the user can go back to the menu or exit.
use kpi_dashboard::config::DashboardConfig;
use kpi_dashboard::dashboard::{build_dashboard, DashboardInputs};
use kpi_dashboard::loader::load_inputs;
use kpi_dashboard::output::{preview_table, write_json};
use kpi_dashboard::reports::build_reports;
use kpi_dashboard::util::{format_int, format_number};
use kpi_dashboard::Result;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

// Loaded inputs are kept for the whole run so reports can be regenerated
// without re-reading the files.
struct Session {
    config: DashboardConfig,
    inputs: Option<DashboardInputs>,
}

/// `None` once stdin is closed.
fn read_choice() -> Option<String> {
    print!("Enter choice: ");
    let _ = io::stdout().flush();
    let mut buf = String::new();
    match io::stdin().read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

/// Returns `true` if the user chose `Y`, `false` if they chose `N`.
fn prompt_back_to_menu() -> bool {
    loop {
        print!("Back to Report Selection (Y/N): ");
        let _ = io::stdout().flush();
        let mut buf = String::new();
        if io::stdin().read_line(&mut buf).unwrap_or(0) == 0 {
            return false;
        }
        match buf.trim().to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

fn handle_load(session: &mut Session) {
    match load_inputs(&session.config) {
        Ok((inputs, report)) => {
            println!(
                "Processing dataset... ({} rows loaded, {} stores, {} regions)",
                format_int(report.total_rows),
                format_int(inputs.store_kpis.len()),
                format_int(inputs.region_battle.len())
            );
            if report.blank_cells > 0 {
                println!(
                    "Note: {} blank cells left out.",
                    format_int(report.blank_cells)
                );
            }
            println!();
            session.inputs = Some(inputs);
        }
        Err(e) => {
            error!(error = %e, "load failed");
            eprintln!("Failed to load data: {}\n", e);
        }
    }
}

fn generate_reports(session: &Session, inputs: &DashboardInputs) -> Result<()> {
    let config = &session.config;
    let dashboard = build_dashboard(inputs, config)?;

    println!("Generating reports...");
    println!("Outputs saved to individual files...\n");
    std::fs::create_dir_all(&config.output_dir)?;
    for (i, report) in build_reports(&dashboard, config).iter().enumerate() {
        let path = config.output_path(report.file);
        if let Err(e) = report.table.write_csv(&path) {
            warn!(file = report.file, error = %e, "write failed");
            eprintln!("Write error: {}", e);
        }
        println!("Report {}: {}\n", i + 1, report.title);
        preview_table(report.title, report.note.as_deref(), &report.table, config.preview_rows);
        println!("(Full table exported to {})\n", path.display());
    }

    let summary = dashboard.summary();
    write_json(&config.output_path("summary.json"), &summary)?;
    println!("Summary Stats (summary.json):");
    let top = summary
        .highlights
        .first()
        .map(|h| format!("{} ({})", h.cluster, format_number(h.score, 2)))
        .unwrap_or_else(|| "none".to_string());
    println!(
        "{{\"stores\": {}, \"clusters\": {}, \"top_highlight\": \"{}\"}}\n",
        summary.total_stores, summary.total_clusters, top
    );
    Ok(())
}

fn handle_generate_reports(session: &Session) {
    let Some(inputs) = session.inputs.as_ref() else {
        println!("Error: No data loaded. Please load the data first (option 1).\n");
        return;
    };
    if let Err(e) = generate_reports(session, inputs) {
        error!(error = %e, "report generation failed");
        eprintln!("Failed to generate reports: {}\n", e);
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = match DashboardConfig::load(config_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };
    let mut session = Session {
        config,
        inputs: None,
    };

    loop {
        println!("Select an option:");
        println!("[1] Load the data");
        println!("[2] Generate Reports\n");
        let Some(choice) = read_choice() else {
            break;
        };
        match choice.as_str() {
            "1" => handle_load(&mut session),
            "2" => {
                println!();
                handle_generate_reports(&session);
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            _ => println!("Invalid choice. Please enter 1 or 2.\n"),
        }
    }
}
