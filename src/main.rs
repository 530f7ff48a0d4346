// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Context, Result};
use std::env;
use std::path::Path;

use formgrid::{
    example_csv, export, init_tracing, mock_rows, read_file, value_totals, AppConfig,
    DirectorySink, FormDraft, LocalEndpoint, Record, SqliteStore, TableRow, TableStore,
    WizardStore, CSV_TABLE_KEY, DATA_TABLE_KEY,
};

fn main() -> Result<()> {
    let config = AppConfig::from_env();
    init_tracing(&config.log_filter);

    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("import") => {
            let Some(file) = args.get(2) else {
                bail!("usage: formgrid import <file.csv>");
            };
            run_import(&config, Path::new(file))?;
        }
        Some("export") => run_export(&config, args.get(2).map(String::as_str))?,
        Some("example") => run_example(args.get(2).map(String::as_str).unwrap_or("example.csv"))?,
        Some("rows") => run_rows(&config)?,
        Some("quote") => {
            let Some(file) = args.get(2) else {
                bail!("usage: formgrid quote <form.json>");
            };
            run_quote(&config, Path::new(file))?;
        }
        Some(other) => bail!(
            "unknown command: {} (expected import, export, example, rows or quote)",
            other
        ),
        None => run_ui_mode(&config)?,
    }

    Ok(())
}

fn open_records(config: &AppConfig) -> Result<(SqliteStore, TableStore<Record>)> {
    let kv = SqliteStore::open(&config.db_path)?;
    let mut store = TableStore::for_records();
    store
        .load_records(&kv, CSV_TABLE_KEY)
        .context("Failed to restore the CSV table")?;
    Ok((kv, store))
}

fn run_import(config: &AppConfig, file: &Path) -> Result<()> {
    println!("📂 Importing {}", file.display());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let (kv, mut store) = open_records(config)?;
    let before = store.total_count();

    store.set_loading(true);
    let result = store.apply_parse(read_file(file));
    store.set_loading(false);

    match result {
        Ok(added) => {
            store.save(&kv, CSV_TABLE_KEY)?;
            println!("✓ Parsed {} rows", added);
            println!("✓ Table now holds {} rows (was {})", store.total_count(), before);
            println!("💾 Saved to {}", config.db_path.display());
            Ok(())
        }
        Err(reason) => {
            eprintln!("❌ Import failed: {}", reason);
            std::process::exit(1);
        }
    }
}

fn run_export(config: &AppConfig, name: Option<&str>) -> Result<()> {
    let (_kv, store) = open_records(config)?;

    let (records, scope) = if store.selected_count() > 0 {
        (store.selected_rows(), "selected")
    } else {
        (store.all_rows(), "all")
    };

    let sink = DirectorySink::new(&config.export_dir);
    match export(records, name, &sink) {
        Ok(filename) => {
            println!("✓ Exported {} {} rows", records.len(), scope);
            println!("📄 {}", sink.dir().join(filename).display());
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Export failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn run_example(path: &str) -> Result<()> {
    std::fs::write(path, example_csv()).with_context(|| format!("Failed to write {}", path))?;
    println!("✓ Example CSV written to {}", path);
    Ok(())
}

fn run_rows(config: &AppConfig) -> Result<()> {
    let kv = SqliteStore::open(&config.db_path)?;
    let mut store: TableStore<TableRow> = TableStore::new("id");

    if !store.load(&kv, DATA_TABLE_KEY)? {
        println!("📊 No saved rows, loading sample data...");
        store.set_loading(true);
        store.set_all_rows(mock_rows());
        store.set_loading(false);
        store.save(&kv, DATA_TABLE_KEY)?;
    }

    println!(
        "\n{:<38} {:<10} {:<16} {:<10} {:>10}",
        "ID", "Title", "Category", "Status", "Value"
    );
    println!("{}", "━".repeat(88));
    for row in store.all_rows() {
        let mark = if store.is_row_selected(row) { "*" } else { " " };
        println!(
            "{}{:<37} {:<10} {:<16} {:<10} {:>10.2}",
            mark,
            row.id,
            row.title1,
            row.category,
            row.status.name(),
            row.value
        );
    }

    let totals = value_totals(store.all_rows());
    println!("\n✓ {} rows, total value {:.2}", totals.count, totals.total);
    for (status, total) in &totals.by_status {
        println!("   {:<10} {:>10.2}", status.name(), total);
    }

    Ok(())
}

fn run_quote(config: &AppConfig, file: &Path) -> Result<()> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let draft: FormDraft = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse form data in {}", file.display()))?;

    let kv = SqliteStore::open(&config.db_path)?;
    let mut wizard = WizardStore::load(&kv)?;
    println!("🧭 Form wizard (resuming at step {})", wizard.current_step());

    let mut checks = Vec::new();
    if let Some(step1) = draft.step1 {
        checks.push((1, wizard.update_step1(step1)));
    }
    if let Some(step2) = draft.step2 {
        checks.push((2, wizard.update_step2(step2)));
    }
    if let Some(step3) = draft.step3 {
        checks.push((3, wizard.update_step3(step3)));
    }
    for (step, check) in &checks {
        match check {
            Ok(()) => println!("✓ Step {} valid", step),
            Err(errors) => {
                for error in &errors.0 {
                    println!("✗ Step {}: {}: {}", step, error.field, error.message);
                }
            }
        }
    }
    while wizard.next_step() {}
    println!("📈 Progress: {:.0}%", wizard.progress());

    let outcome = wizard.submit(&LocalEndpoint);
    wizard.save(&kv)?;

    match outcome {
        Ok(quote) => {
            println!("\n💰 Quote for {} user", quote.user_type.label());
            for product in &quote.recommended_products {
                println!("   • {}", product);
            }
            println!("   Estimated cost: {:.2}", quote.estimated_cost);
            println!("   Timeline: {}", quote.timeline);
            Ok(())
        }
        Err(reason) => {
            eprintln!("❌ Submission failed: {}", reason);
            std::process::exit(1);
        }
    }
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &AppConfig) -> Result<()> {
    println!("🖥️  Loading CSV table...\n");

    let (kv, store) = open_records(config)?;
    if store.total_count() == 0 {
        println!("ℹ️  The table is empty. Run: formgrid import <file.csv>");
    }
    println!("Starting UI... (Press 'q' to quit)\n");

    let mut app = ui::App::new(store, Box::new(DirectorySink::new(&config.export_dir)));
    ui::run_ui(&mut app)?;

    let store = app.into_store();
    store.save(&kv, CSV_TABLE_KEY)?;
    println!("\n✅ UI closed, {} rows saved", store.total_count());

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &AppConfig) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the HTTP API: cargo run --bin formgrid-server --features server");
    std::process::exit(1);
}
