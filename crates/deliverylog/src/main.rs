//! `dlog` - CLI for deliverylog
//!
//! This binary records deliveries from flags or an interactive session and
//! manages the outbox of rows waiting for the remote spreadsheet.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use anyhow::{bail, Context, Result};
use clap::Parser;

use deliverylog::cli::{
    Cli, Command, ConfigCommand, OutboxCommand, OutputFormat, RecordCommand, SessionCommand,
};
use deliverylog::prompt::{self, FormAnswers};
use deliverylog::record::DATE_FORMAT;
use deliverylog::session::{record_answers, StepOutcome};
use deliverylog::{
    init_logging, sink, Config, MediaStore, Outbox, Recorder, SessionTable, Submission, Validator,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    // Validation must be able to report a broken file, so it loads on its own.
    if let Command::Config(config_cmd) = cli.command {
        return handle_config(cli.config, config_cmd);
    }

    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(async {
        match cli.command {
            Command::Record(cmd) => handle_record(&config, cmd).await,
            Command::Session(cmd) => handle_session(&config, cmd).await,
            Command::Outbox(cmd) => handle_outbox(&config, cmd).await,
            Command::Status(cmd) => handle_status(&config, cmd.json),
            Command::Config(_) => Ok(()),
        }
    })
}

/// Wire the recorder from configuration. The sink is built once here.
fn build_recorder(config: &Config) -> Result<Recorder> {
    let validator = Validator::from_config(&config.validation)?;
    let mut recorder =
        Recorder::new(MediaStore::new(&config.storage.data_dir)).with_validator(validator);

    if let Some(sink) = sink::from_config(config).context("failed to set up remote sink")? {
        recorder = recorder.with_sink(sink);
        if config.remote.outbox_enabled {
            let outbox = Outbox::open(config.outbox_path()).context("failed to open outbox")?;
            recorder = recorder.with_outbox(outbox);
        }
    }
    Ok(recorder)
}

async fn handle_record(config: &Config, cmd: RecordCommand) -> Result<()> {
    let recorder = build_recorder(config)?;

    let answers = FormAnswers {
        date: cmd.date.unwrap_or_else(|| {
            chrono::Local::now()
                .date_naive()
                .format(DATE_FORMAT)
                .to_string()
        }),
        worker_name: cmd.worker,
        driver_name: cmd.driver,
        track_plate: cmd.plate,
        goods_description: cmd.goods,
        goods_number: cmd.number.to_string(),
        weight_tons: cmd.weight,
        plate_image: path_arg(cmd.plate_image.as_deref()),
        goods_image: path_arg(cmd.goods_image.as_deref()),
    };
    let form = answers.into_form()?;

    let mut table = SessionTable::new();
    let submission = recorder.submit(&mut table, form).await?;

    match cmd.format {
        OutputFormat::Plain => print_submission(&submission),
        OutputFormat::Table => print!("{}", table.render()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&submission)?),
    }

    if let Some(path) = cmd.export {
        table
            .export_csv(&path)
            .with_context(|| format!("failed to export to {}", path.display()))?;
    }
    Ok(())
}

fn path_arg(path: Option<&std::path::Path>) -> String {
    path.map(|p| p.display().to_string()).unwrap_or_default()
}

fn print_submission(submission: &Submission) {
    let record = &submission.record;
    println!(
        "Delivery #{} recorded: {} on {}",
        submission.row_index + 1,
        record.track_plate,
        record.date_string()
    );
    for path in [&record.plate_image_path, &record.goods_image_path]
        .into_iter()
        .flatten()
    {
        println!("  image: {}", path.display());
    }
    println!("  {}", submission.sync);
}

async fn handle_session(config: &Config, cmd: SessionCommand) -> Result<()> {
    let recorder = build_recorder(config)?;
    let mut table = SessionTable::new();
    let mut previous: Option<FormAnswers> = None;

    println!(
        "Recording deliveries; photos go under {}.",
        recorder.media().root().display()
    );
    // A terminal failure ends the loop but not the session: rows recorded so
    // far are still exported below.
    let interrupted = loop {
        let answers = match prompt::ask_form(previous.as_ref()) {
            Ok(answers) => answers,
            Err(e) => break Some(e),
        };

        match record_answers(&recorder, &mut table, answers.clone()).await {
            StepOutcome::Recorded(submission) => {
                println!();
                println!("{}", submission.sync);
                print!("{}", table.render());
            }
            StepOutcome::Failed {
                error,
                kept_locally: true,
            } => eprintln!("Saved locally but not synced: {error}"),
            StepOutcome::Failed { error, .. } => eprintln!("Not recorded: {error}"),
        }
        previous = Some(answers);

        match prompt::confirm("Record another delivery?", true) {
            Ok(true) => {}
            Ok(false) => break None,
            Err(e) => break Some(e),
        }
    };

    if !table.is_empty() {
        let path = cmd
            .export
            .unwrap_or_else(|| config.export.default_path.clone());
        let export = if interrupted.is_some() {
            true
        } else {
            let question = format!("Export {} deliveries to {}?", table.len(), path.display());
            prompt::confirm(&question, true)?
        };
        if export {
            table
                .export_csv(&path)
                .with_context(|| format!("failed to export to {}", path.display()))?;
            println!("Exported {} deliveries to {}", table.len(), path.display());
        }
    }

    match interrupted {
        Some(e) => Err(e).context("session ended early"),
        None => Ok(()),
    }
}

async fn handle_outbox(config: &Config, cmd: OutboxCommand) -> Result<()> {
    match cmd {
        OutboxCommand::Status { json } => {
            let outbox = Outbox::open(config.outbox_path()).context("failed to open outbox")?;
            let stats = outbox.stats()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Outbox:        {}", outbox.path().display());
                println!("Pending rows:  {}", stats.pending_rows);
                if let Some(oldest) = stats.oldest_queued {
                    println!("Oldest queued: {}", oldest.to_rfc3339());
                }
                if let Some(error) = &stats.last_error {
                    println!("Last error:    {error}");
                }
                println!("Size:          {} bytes", stats.db_size_bytes);
            }
        }
        OutboxCommand::List { limit } => {
            let outbox = Outbox::open(config.outbox_path()).context("failed to open outbox")?;
            let rows = outbox.pending(limit)?;
            if rows.is_empty() {
                println!("No rows waiting.");
            }
            for row in rows {
                println!(
                    "#{} [{}] {} attempts={} {}",
                    row.id,
                    row.sink,
                    row.queued_at.to_rfc3339(),
                    row.attempts,
                    row.values.join(",")
                );
                if let Some(error) = row.last_error {
                    println!("    last error: {error}");
                }
            }
        }
        OutboxCommand::Flush => {
            if !config.has_remote() {
                bail!("no remote sink is configured");
            }
            let recorder = build_recorder(config)?;
            if recorder.outbox().is_none() {
                bail!("the outbox is disabled (remote.outbox_enabled = false)");
            }
            let report = recorder.flush_outbox().await?;
            println!(
                "Delivered {} rows, {} remaining",
                report.delivered, report.remaining
            );
            if let Some(error) = report.error {
                bail!("flush stopped: {error}");
            }
        }
    }
    Ok(())
}

fn handle_status(config: &Config, json: bool) -> Result<()> {
    let outbox_path = config.outbox_path();
    let pending = if outbox_path.exists() {
        Some(Outbox::open(&outbox_path)?.count()?)
    } else {
        None
    };

    if json {
        let status = serde_json::json!({
            "data_dir": config.storage.data_dir,
            "remote": config.remote.kind.to_string(),
            "outbox_enabled": config.remote.outbox_enabled,
            "outbox_path": outbox_path,
            "pending_rows": pending.unwrap_or(0),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("dlog status");
        println!("-----------");
        println!("Data dir:      {}", config.storage.data_dir.display());
        if config.has_remote() {
            println!("Remote sink:   {}", config.remote.kind);
        } else {
            println!("Remote sink:   none (local only)");
        }
        println!("Outbox:        {}", outbox_path.display());
        println!(
            "Pending rows:  {}",
            pending.map_or_else(|| "none".to_string(), |n| n.to_string())
        );
    }
    Ok(())
}

fn handle_config(path: Option<std::path::PathBuf>, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = Config::load_from(path).context("failed to load configuration")?;
            let config = config.redacted();
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Data dir:           {}", config.storage.data_dir.display());
                println!("  Outbox path:        {}", config.outbox_path().display());
                println!();
                println!("[Remote]");
                println!("  Kind:               {}", config.remote.kind);
                println!("  Outbox enabled:     {}", config.remote.outbox_enabled);
                println!("  Timeout (secs):     {}", config.remote.timeout_secs);
                if let Some(id) = &config.remote.spreadsheet_id {
                    println!("  Spreadsheet:        {id} ({})", config.remote.sheet_name);
                }
                if let Some(csv) = &config.remote.csv_path {
                    println!("  CSV file:           {}", csv.display());
                }
                println!();
                println!("[Validation]");
                println!("  Enabled:            {}", config.validation.enabled);
                println!("  Plate pattern:      {}", config.validation.plate_pattern);
                println!("  Max text length:    {}", config.validation.max_text_length);
                println!();
                println!("[Export]");
                println!(
                    "  Default path:       {}",
                    config.export.default_path.display()
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.or(path).unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => bail!("configuration error: {e}"),
            }
        }
    }
    Ok(())
}
