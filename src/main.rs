use anyhow::{bail, Context, Result};
use spansh_galaxy_store::{
    batch::{export_file, ImportOptions, ImportReport, Importer},
    cli::{Cli, Commands, ConfigAction, GlobalArgs},
    config::Config,
    download::ensure_dataset_downloaded,
    schema::DependencyResolver,
    store::GalaxyStore,
    ui::{Phase, ProgressUi, SilentUi, Ui},
};
use std::path::Path;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging(&cli.global);

    let config_path = cli
        .global
        .config
        .clone()
        .unwrap_or_else(Config::default_path);
    let mut config = Config::load(&config_path)?;
    if let Some(database) = &cli.global.database {
        config.database.path = database.clone();
    }

    match cli.command {
        Commands::ListTables { tables } => list_tables(&tables),
        Commands::Config { action } => configure(&config_path, &config, action),
        command if cli.global.quiet => run(command, &config, &mut SilentUi::new()).map(|_| ()),
        command => {
            let mut ui = ProgressUi::new();
            let summary = run(command, &config, &mut ui);
            match &summary {
                Ok(summary) => ui.finish(summary),
                Err(_) => ui.finish("Failed"),
            }
            summary.map(|summary| println!("{}", summary))
        }
    }
}

fn init_logging(args: &GlobalArgs) {
    let level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Run a database or download command and describe what it did
fn run(command: Commands, config: &Config, ui: &mut impl Ui) -> Result<String> {
    let start = Instant::now();
    let db_path = &config.database.path;

    let summary = match command {
        Commands::Init { force } => {
            let store = open_store(config)?;
            if force {
                store.reset()?;
            } else {
                store.create_tables()?;
            }
            format!("Initialized {:?}", db_path)
        }

        Commands::Import { input, jobs } => {
            let report = import(config, &input, jobs, ui)?;
            import_summary(&report, db_path)?
        }

        Commands::Sync {
            dataset,
            force,
            jobs,
        } => {
            let input = ensure_dataset_downloaded(
                &dataset,
                config.download.cache_dir.clone(),
                &config.download.base_url,
                force,
                ui,
            )?;
            let report = import(config, &input, jobs, ui)?;
            import_summary(&report, db_path)?
        }

        Commands::Download {
            dataset,
            force,
            output,
        } => {
            let path = ensure_dataset_downloaded(
                &dataset,
                output.or_else(|| config.download.cache_dir.clone()),
                &config.download.base_url,
                force,
                ui,
            )?;
            format!("{} downloaded to {:?}", dataset, path)
        }

        Commands::Export { output, systems } => {
            let store = open_store(config)?;
            if !store.is_initialized()? {
                bail!("{:?} holds no galaxy tables; run `init` or `import` first", db_path);
            }
            ui.set_phase(Phase::Exporting);
            let bar = ui.bar(0, "systems");
            let written = export_file(&store, &systems, &output, &bar)
                .with_context(|| format!("Failed to export to {:?}", output))?;
            bar.finish_and_clear();
            format!("Exported {} systems to {:?}", written, output)
        }

        Commands::ListTables { .. } | Commands::Config { .. } => {
            bail!("not a database command")
        }
    };

    Ok(format!("{} in {:.1}s", summary, start.elapsed().as_secs_f64()))
}

fn open_store(config: &Config) -> Result<GalaxyStore> {
    GalaxyStore::open_with_timeout(&config.database.path, config.import.busy_timeout())
        .with_context(|| format!("Failed to open database {:?}", config.database.path))
}

fn import(
    config: &Config,
    input: &Path,
    jobs: Option<usize>,
    ui: &mut impl Ui,
) -> Result<ImportReport> {
    let mut options = ImportOptions::from(&config.import);
    if let Some(jobs) = jobs {
        options.jobs = jobs;
    }

    ui.set_phase(Phase::Importing);
    ui.set_info(format!("{} with {} workers", input.display(), options.jobs));
    let importer = Importer::new(&config.database.path, options)
        .with_context(|| format!("Failed to prepare database {:?}", config.database.path))?;

    let bar = ui.bar(0, "documents");
    let report = importer
        .import_file(input, &bar)
        .with_context(|| format!("Failed to import {:?}", input))?;
    bar.finish_and_clear();
    open_store(config)?.finalize()?;

    for failure in report.failures() {
        if let Err(e) = &failure.result {
            ui.log(format!("{}: {}", failure.label(), e));
        }
    }
    Ok(report)
}

fn import_summary(report: &ImportReport, db_path: &Path) -> Result<String> {
    let changes = report.changes();
    if report.failed() > 0 {
        bail!(
            "{} of {} documents failed to import into {:?}",
            report.failed(),
            report.documents(),
            db_path
        );
    }
    Ok(format!(
        "Imported {} documents into {:?} ({} entities updated, {} unchanged)",
        report.documents(),
        db_path,
        changes.applied,
        changes.skipped
    ))
}

fn list_tables(tables: &[String]) -> Result<()> {
    let resolver = DependencyResolver::new();
    let ordered = if tables.is_empty() {
        resolver.creation_order()
    } else {
        let refs: Vec<&str> = tables.iter().map(String::as_str).collect();
        resolver.resolve_includes(&refs)
    }
    .map_err(anyhow::Error::msg)?;

    println!("Tables in dependency order:\n");
    for schema in ordered {
        let dependents = resolver.dependents(schema.name);
        if dependents.is_empty() {
            println!("  {}", schema.name);
        } else {
            println!("  {:<24} <- {}", schema.name, dependents.join(", "));
        }
    }
    Ok(())
}

fn configure(path: &Path, effective: &Config, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            println!("# {}", path.display());
            print!("{}", toml::to_string_pretty(effective)?);
        }
        ConfigAction::Get { key } => println!("{}", effective.get(&key)?),
        ConfigAction::Set { key, value } => {
            // start from the file so CLI overrides are not persisted
            let mut config = Config::load(path)?;
            config.set(&key, &value)?;
            config.save(path)?;
            println!("{} = {}", key, config.get(&key)?);
        }
    }
    Ok(())
}
