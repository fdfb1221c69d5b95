//! Sprite-sheet command implementations

use anyhow::{Context, Result};
use clap::Subcommand;
use particle_sheet::{SEQUENCE_SAMPLE_COUNT, Sheet, SheetLoader};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::utils::{add_numeric_row, create_table, format_bytes, format_flags, format_seconds};

#[derive(Subcommand)]
pub enum SheetCommands {
    /// Display the sequences of a sheet file
    Info {
        /// Path to the sheet file
        file: PathBuf,

        /// Also list backfilled and empty slots
        #[arg(short, long)]
        detailed: bool,

        /// Print the sequence table as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check a sheet file against the strict loader
    Validate {
        /// Path to the sheet file
        file: PathBuf,
    },

    /// Look up the texture rectangles a particle of a given age would use
    Sample {
        /// Path to the sheet file
        file: PathBuf,

        /// Sequence slot to sample
        #[arg(short, long, default_value = "0")]
        sequence: usize,

        /// Particle age in seconds
        #[arg(short, long, default_value = "0")]
        age: f32,

        /// Animation cycles per second
        #[arg(short, long, default_value = "1")]
        rate: f32,
    },
}

#[derive(Serialize)]
struct SequenceReport {
    slot: usize,
    frames: u32,
    total_time: f32,
    frame_span: f32,
    flags: String,
    copy: bool,
}

fn load_sheet(file: &Path, strict: bool) -> Result<Sheet> {
    SheetLoader::new()
        .strict(strict)
        .load_file(file)
        .with_context(|| format!("Failed to load sheet file: {}", file.display()))
}

fn sequence_reports(sheet: &Sheet, detailed: bool) -> Vec<SequenceReport> {
    sheet
        .sequences()
        .iter()
        .enumerate()
        .filter(|(_, seq)| detailed || (seq.is_populated() && !seq.is_copy))
        .map(|(slot, seq)| SequenceReport {
            slot,
            frames: seq.frame_count,
            total_time: seq.total_time,
            frame_span: seq.frame_span,
            flags: format_flags(seq.flags),
            copy: seq.is_copy,
        })
        .collect()
}

fn show_info(file: PathBuf, detailed: bool, json: bool) -> Result<()> {
    let sheet = load_sheet(&file, false)?;
    let reports = sequence_reports(&sheet, detailed);

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    let size = fs::metadata(&file)
        .with_context(|| format!("Failed to stat {}", file.display()))?
        .len();

    println!("Sheet File Information: {}", file.display());
    println!("=====================================");
    println!("File Size: {}", format_bytes(size));
    println!("Images Per Frame: {}", sheet.images_per_frame_on_disk());
    println!("Sequences: {}", sheet.sequence_count());
    println!("Slots: {}", sheet.slot_count());

    if reports.is_empty() {
        println!("\nNo sequences");
        return Ok(());
    }

    println!();
    let mut table = create_table(&["Slot", "Frames", "Total", "Span", "Flags", "Copy"]);
    for report in &reports {
        add_numeric_row(
            &mut table,
            report.slot.to_string(),
            vec![
                report.frames.to_string(),
                format_seconds(report.total_time),
                format_seconds(report.frame_span),
                report.flags.clone(),
                if report.copy { "yes" } else { "" }.to_string(),
            ],
        );
    }
    table.printstd();

    Ok(())
}

fn validate_sheet(file: PathBuf) -> Result<()> {
    println!("Validating sheet file: {}", file.display());

    let sheet = match load_sheet(&file, true) {
        Ok(sheet) => sheet,
        Err(e) => {
            println!("✗ {e:#}");
            return Err(e);
        }
    };

    let mut warnings = Vec::new();
    if sheet.sequence_count() == 0 {
        warnings.push("Sheet defines no sequences".to_string());
    }
    for (slot, seq) in sheet.sequences().iter().enumerate() {
        if seq.is_copy || !seq.is_populated() {
            continue;
        }
        log::debug!("Sequence {slot}: {} frames", seq.frame_count);
        if seq.frame_span <= 0.0 && seq.frame_count > 1 {
            warnings.push(format!("Sequence {slot} has no frame time"));
        }
    }

    if warnings.is_empty() {
        println!("✓ Sheet file is valid");
    } else {
        println!("\nWarnings:");
        for warning in &warnings {
            println!("  ⚠ {warning}");
        }
        println!("\n✓ Sheet file is valid with warnings");
    }
    Ok(())
}

fn show_sample(file: PathBuf, sequence: usize, age: f32, rate: f32) -> Result<()> {
    let sheet = load_sheet(&file, false)?;
    let entry = sheet.sequence(sequence)?;
    let sample = sheet.sample(age, rate * SEQUENCE_SAMPLE_COUNT as f32, sequence);
    let coords = sample.primary();
    let (from, to) = (coords.current(), coords.next());

    println!("Sequence {sequence} at {}", format_seconds(age));
    println!("Flags: {}", format_flags(entry.flags));
    println!(
        "From: ({:.4}, {:.4}) - ({:.4}, {:.4})",
        from.left, from.top, from.right, from.bottom
    );
    println!(
        "To: ({:.4}, {:.4}) - ({:.4}, {:.4})",
        to.left, to.top, to.right, to.bottom
    );
    println!("Blend: {:.4}", sample.blend_factor);
    Ok(())
}

pub fn execute(command: SheetCommands) -> Result<()> {
    match command {
        SheetCommands::Info {
            file,
            detailed,
            json,
        } => show_info(file, detailed, json),
        SheetCommands::Validate { file } => validate_sheet(file),
        SheetCommands::Sample {
            file,
            sequence,
            age,
            rate,
        } => show_sample(file, sequence, age, rate),
    }
}
