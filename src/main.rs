use anyhow::Result;
use clap::Parser;
use photobinner::photobinner_core::config::parse_offset;
use photobinner::photobinner_core::dates::format_for_log;
use photobinner::photobinner_core::{
    Binner, CandidateExtractor, Cli, Commands, Config, ExifToolReader, FileConfig, MetadataReader,
    NoMetadata, VecSink, exiftool_available, get_local_offset, resolve_file,
};
use simplelog::{CombinedLogger, SharedLogger, TermLogger, WriteLogger};
use std::fs::File;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

fn metadata_reader() -> Result<Box<dyn MetadataReader>> {
    if exiftool_available() {
        Ok(Box::new(ExifToolReader::new()?))
    } else {
        log::warn!("exiftool not found, metadata dates will be ignored");
        Ok(Box::new(NoMetadata))
    }
}

fn confirm(config: &Config) -> Result<bool> {
    println!("Source:   {}", config.source.display());
    println!("Target:   {}", config.target.display());
    println!("Transfer: {:?}", config.transfer_method);
    print!("\nProceed? [y/N]: ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize loggers
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        cli.log_level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )];

    if cli.log {
        loggers.push(WriteLogger::new(
            cli.log_level,
            simplelog::Config::default(),
            File::create("photobinner.log")?,
        ));
    }

    CombinedLogger::init(loggers)?;

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        ctrlc::set_handler(move || {
            log::warn!("Interrupted, stopping after the current file..");
            cancel.store(true, Ordering::SeqCst);
        })?;
    }

    let file_config = FileConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run(args) => {
            let yes = args.yes;
            let config = Config::resolve(args, file_config)?;
            let dry_run = config.dry_run;
            let stats_file = config.stats_file.clone();

            if !dry_run && !yes && !confirm(&config)? {
                println!("Aborted.");
                return Ok(());
            }

            let mut binner = Binner::new(config, metadata_reader()?)?;
            let sources = binner.sources()?;
            let result = binner.run(&sources, &cancel);
            let stats = binner.into_stats();

            match stats_file {
                Some(path) => stats.write_out(&path)?,
                None => log::debug!("{}", stats.to_json()?),
            }

            if dry_run {
                println!("\nDry run complete: {}", stats);
            } else {
                println!("\nRun complete: {}", stats);
            }
            result?;
        }

        Commands::Resolve { file, utc_offset } => {
            let offset = match utc_offset.or(file_config.utc_offset) {
                Some(value) => parse_offset(&value)?,
                None => get_local_offset(),
            };
            let extractor =
                CandidateExtractor::new(offset, file_config.assume_local.unwrap_or(true));
            let mut reader = metadata_reader()?;
            let mut sink = VecSink::default();
            let resolution = resolve_file(&file, &extractor, reader.as_mut(), &mut sink)?;

            println!("{}", file.display());
            for candidate in &resolution.candidates.candidates {
                println!("  {:<9} {}", candidate.source.as_str(), format_for_log(&candidate.value));
            }
            let resolved = &resolution.resolved;
            println!(
                "  winner    {} ({})",
                format_for_log(&resolved.value),
                resolved.source
            );
            for anomaly in &resolved.anomalies {
                println!("  anomaly   {}", anomaly);
            }
            if let Some(renamed) = &resolved.renamed_filename {
                println!("  rename    {}", renamed);
            }
        }
    }

    Ok(())
}
