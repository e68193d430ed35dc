// Command implementations for CLI

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, bail, Context};
use log::{debug, info};
use serde_json::{json, Value};

use tagforge::{describe_file, read_tag, write_tag, Picture, PictureType, StandardField, TagConfig, TagRecord};

use super::config::{BatchOperation, Commands, Config};
use super::output::{OutputFormatter, ProgressBar};

/// Field changes given as `--set FIELD=VALUE` and `--clear FIELD`
#[derive(Debug, Default, PartialEq)]
pub struct FieldEdits {
    set: Vec<(StandardField, String)>,
    clear: Vec<StandardField>,
}

impl FieldEdits {
    pub fn parse(set: &[String], clear: &[String]) -> anyhow::Result<Self> {
        let mut edits = FieldEdits::default();
        for assignment in set {
            let (name, value) = assignment
                .split_once('=')
                .ok_or_else(|| anyhow!("expected FIELD=VALUE, got {assignment:?}"))?;
            edits.set.push((parse_field(name)?, value.to_string()));
        }
        for name in clear {
            edits.clear.push(parse_field(name)?);
        }
        Ok(edits)
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.clear.is_empty()
    }

    pub fn apply(&self, record: &mut TagRecord) {
        for field in &self.clear {
            record.set(*field, None);
        }
        for (field, value) in &self.set {
            record.set(*field, Some(value.clone()));
        }
    }
}

fn parse_field(name: &str) -> anyhow::Result<StandardField> {
    StandardField::from_str(name.trim()).map_err(|e| anyhow!(e))
}

/// Run the parsed command line
pub fn run(config: &Config) -> anyhow::Result<()> {
    let tag_config = config.tag_config()?;
    let formatter = OutputFormatter::new(config.format, config.quiet);

    match &config.command {
        Commands::Read { files, fields, output } => {
            command_read(files, fields.as_deref(), output.as_deref(), &tag_config, &formatter)
        }
        Commands::Write {
            file,
            set,
            clear,
            from_file,
        } => command_write(file, set, clear, from_file.as_deref(), &tag_config, &formatter),
        Commands::Copy { source, targets } => command_copy(source, targets, &tag_config, &formatter),
        Commands::Batch {
            directory,
            pattern,
            operation,
            set,
            clear,
        } => command_batch(directory, pattern, *operation, set, clear, &tag_config, &formatter),
        Commands::Detect { files } => command_detect(files, &formatter),
        Commands::ExportCover { file, output, index } => {
            command_export_cover(file, output, *index, &tag_config, &formatter)
        }
        Commands::SetCover {
            file,
            image,
            picture_type,
            description,
            append,
        } => command_set_cover(
            file,
            image,
            *picture_type,
            description.clone(),
            *append,
            &tag_config,
            &formatter,
        ),
        Commands::RemoveCover { files } => command_remove_cover(files, &tag_config, &formatter),
        Commands::Info { files } => command_info(files, &tag_config, &formatter),
    }
}

/// Record as JSON, with picture payloads replaced by a summary
fn record_json(record: &TagRecord) -> anyhow::Result<Value> {
    let mut value = serde_json::to_value(record)?;
    if let Some(obj) = value.as_object_mut() {
        if !record.pictures.is_empty() {
            let pictures = record
                .pictures
                .iter()
                .map(|p| {
                    json!({
                        "type": p.picture_type.as_str(),
                        "mime_type": p.mime_type(),
                        "description": p.description,
                        "size": p.data.len(),
                    })
                })
                .collect();
            obj.insert("pictures".to_string(), Value::Array(pictures));
        }
    }
    Ok(value)
}

fn filter_fields(value: &mut Value, fields: &str) {
    let wanted: Vec<&str> = fields.split(',').map(str::trim).collect();
    if let Some(obj) = value.as_object_mut() {
        obj.retain(|key, _| wanted.contains(&key.as_str()));
    }
}

fn report_warnings(formatter: &OutputFormatter, path: &Path, report: &tagforge::WriteReport) {
    for warning in &report.warnings {
        formatter.print_info(&format!("{}: {warning}", path.display()));
    }
}

fn command_read(
    files: &[PathBuf],
    fields: Option<&str>,
    output: Option<&Path>,
    config: &TagConfig,
    formatter: &OutputFormatter,
) -> anyhow::Result<()> {
    let mut writer: Box<dyn Write> = match output {
        Some(path) => Box::new(File::create(path).with_context(|| format!("Failed to create {}", path.display()))?),
        None => Box::new(io::stdout().lock()),
    };

    let mut failed = 0;
    for file in files {
        match read_tag(file, config) {
            Ok(record) => {
                let mut value = record_json(&record)?;
                if let Some(fields) = fields {
                    filter_fields(&mut value, fields);
                }
                let title = file.display().to_string();
                formatter.output(Some(&title), &value, &mut writer)?;
            }
            Err(e) => {
                formatter.print_error(&format!("{}: {e}", file.display()));
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} file(s) could not be read", files.len());
    }
    Ok(())
}

fn command_write(
    file: &Path,
    set: &[String],
    clear: &[String],
    from_file: Option<&Path>,
    config: &TagConfig,
    formatter: &OutputFormatter,
) -> anyhow::Result<()> {
    let edits = FieldEdits::parse(set, clear)?;

    let mut record: TagRecord = match from_file {
        Some(json_path) => {
            let json = fs::read_to_string(json_path)
                .with_context(|| format!("Failed to read {}", json_path.display()))?;
            serde_json::from_str(&json).with_context(|| format!("Invalid tag record in {}", json_path.display()))?
        }
        None => read_tag(file, config).with_context(|| format!("Failed to read {}", file.display()))?,
    };

    if from_file.is_none() && edits.is_empty() {
        bail!("nothing to write: pass --set, --clear or --from-file");
    }
    edits.apply(&mut record);

    let report = write_tag(file, &record, config).with_context(|| format!("Failed to write {}", file.display()))?;
    report_warnings(formatter, file, &report);
    formatter.print_success(&format!("Updated {}", file.display()));
    Ok(())
}

fn command_copy(
    source: &Path,
    targets: &[PathBuf],
    config: &TagConfig,
    formatter: &OutputFormatter,
) -> anyhow::Result<()> {
    let record = read_tag(source, config).with_context(|| format!("Failed to read {}", source.display()))?;

    let mut failed = 0;
    for target in targets {
        match write_tag(target, &record, config) {
            Ok(report) => {
                report_warnings(formatter, target, &report);
                formatter.print_success(&format!("Copied tags to {}", target.display()));
            }
            Err(e) => {
                formatter.print_error(&format!("{}: {e}", target.display()));
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} target(s) failed", targets.len());
    }
    Ok(())
}

fn command_batch(
    directory: &Path,
    pattern: &str,
    operation: BatchOperation,
    set: &[String],
    clear: &[String],
    config: &TagConfig,
    formatter: &OutputFormatter,
) -> anyhow::Result<()> {
    let edits = FieldEdits::parse(set, clear)?;
    if operation == BatchOperation::Write && edits.is_empty() {
        bail!("batch write needs --set or --clear");
    }

    let glob_pattern = directory.join(pattern);
    let glob_pattern = glob_pattern.to_string_lossy();
    let mut files = Vec::new();
    for entry in glob::glob(&glob_pattern).with_context(|| format!("Invalid glob pattern {glob_pattern}"))? {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => debug!("Skipping unreadable entry: {e}"),
        }
    }

    if files.is_empty() {
        formatter.print_info(&format!("No files match {glob_pattern}"));
        return Ok(());
    }
    info!("Batch {operation} over {} file(s)", files.len());

    let mut progress = ProgressBar::new(files.len(), !formatter.quiet && operation != BatchOperation::Read);
    let mut success = 0;
    let mut skipped = 0;
    let mut errors = Vec::new();
    let mut stdout = io::stdout().lock();

    for path in &files {
        let result = batch_one(path, operation, &edits, config, formatter, &mut stdout);

        match result {
            Ok(true) => success += 1,
            Ok(false) => skipped += 1,
            Err(e) => errors.push(format!("{}: {e}", path.display())),
        }
        progress.increment(&path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default());
    }

    for error in &errors {
        formatter.print_error(error);
    }
    formatter.print_success(&format!(
        "Batch {operation}: {success} succeeded, {skipped} unchanged, {} failed",
        errors.len()
    ));

    if !errors.is_empty() {
        bail!("{} file(s) failed", errors.len());
    }
    Ok(())
}

/// Run one batch operation; `false` means the file was left untouched
fn batch_one(
    path: &Path,
    operation: BatchOperation,
    edits: &FieldEdits,
    config: &TagConfig,
    formatter: &OutputFormatter,
    writer: &mut impl Write,
) -> anyhow::Result<bool> {
    let mut record = read_tag(path, config)?;
    match operation {
        BatchOperation::Read => {
            let title = path.display().to_string();
            formatter.output(Some(&title), &record_json(&record)?, writer)?;
            Ok(true)
        }
        BatchOperation::Write => {
            edits.apply(&mut record);
            write_tag(path, &record, config)?;
            Ok(true)
        }
        BatchOperation::Normalize if record.dirty => {
            write_tag(path, &record, config)?;
            Ok(true)
        }
        BatchOperation::Normalize => Ok(false),
    }
}

fn command_detect(files: &[PathBuf], formatter: &OutputFormatter) -> anyhow::Result<()> {
    let mut stdout = io::stdout().lock();
    for file in files {
        let description = describe_file(file);
        let value = json!({
            "file": file.display().to_string(),
            "kind": description.kind,
            "extension": description.extension,
            "tag_format": description.tag_format.map(|f| f.name()),
        });
        formatter.output(None, &value, &mut stdout)?;
    }
    Ok(())
}

/// Pictures to export: all of them, or the one at `index`
fn select_pictures(pictures: &[Picture], index: Option<usize>) -> anyhow::Result<Vec<(usize, &Picture)>> {
    match index {
        Some(i) => {
            let picture = pictures
                .get(i)
                .ok_or_else(|| anyhow!("picture index {i} out of range ({} available)", pictures.len()))?;
            Ok(vec![(i, picture)])
        }
        None => Ok(pictures.iter().enumerate().collect()),
    }
}

fn command_export_cover(
    file: &Path,
    output: &Path,
    index: Option<usize>,
    config: &TagConfig,
    formatter: &OutputFormatter,
) -> anyhow::Result<()> {
    let record = read_tag(file, config).with_context(|| format!("Failed to read {}", file.display()))?;
    if record.pictures.is_empty() {
        bail!("{} has no embedded pictures", file.display());
    }

    fs::create_dir_all(output).with_context(|| format!("Failed to create {}", output.display()))?;
    let stem = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "cover".to_string());

    for (i, picture) in select_pictures(&record.pictures, index)? {
        let target = output.join(format!("{stem}_{i}.{}", picture.format().extension()));
        fs::write(&target, &picture.data).with_context(|| format!("Failed to write {}", target.display()))?;
        formatter.print_success(&format!(
            "Exported {} ({}, {} bytes) to {}",
            picture.picture_type.as_str(),
            picture.mime_type(),
            picture.data.len(),
            target.display()
        ));
    }
    Ok(())
}

fn command_set_cover(
    file: &Path,
    image: &Path,
    picture_type: u32,
    description: Option<String>,
    append: bool,
    config: &TagConfig,
    formatter: &OutputFormatter,
) -> anyhow::Result<()> {
    let picture_type =
        PictureType::from_u32(picture_type).ok_or_else(|| anyhow!("invalid picture type {picture_type}"))?;
    let data = fs::read(image).with_context(|| format!("Failed to read {}", image.display()))?;
    if data.is_empty() {
        bail!("{} is empty", image.display());
    }

    let mut record = read_tag(file, config).with_context(|| format!("Failed to read {}", file.display()))?;
    if !append {
        record.pictures.clear();
    }
    let mut picture = Picture::new(picture_type, data);
    picture.description = description.filter(|d| !d.is_empty());
    record.add_picture(picture);

    let report = write_tag(file, &record, config).with_context(|| format!("Failed to write {}", file.display()))?;
    report_warnings(formatter, file, &report);
    formatter.print_success(&format!("Set {} on {}", picture_type.as_str(), file.display()));
    Ok(())
}

fn command_remove_cover(files: &[PathBuf], config: &TagConfig, formatter: &OutputFormatter) -> anyhow::Result<()> {
    let mut failed = 0;
    for file in files {
        let result = read_tag(file, config).and_then(|mut record| {
            if record.pictures.is_empty() {
                return Ok(false);
            }
            record.pictures.clear();
            write_tag(file, &record, config).map(|_| true)
        });
        match result {
            Ok(true) => formatter.print_success(&format!("Removed pictures from {}", file.display())),
            Ok(false) => formatter.print_info(&format!("{}: no pictures", file.display())),
            Err(e) => {
                formatter.print_error(&format!("{}: {e}", file.display()));
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} file(s) failed", files.len());
    }
    Ok(())
}

fn file_info(file: &Path, config: &TagConfig) -> anyhow::Result<Value> {
    let metadata = fs::metadata(file).with_context(|| format!("Failed to stat {}", file.display()))?;
    let modified = metadata
        .modified()
        .ok()
        .map(|time| chrono::DateTime::<chrono::Local>::from(time).format("%Y-%m-%d %H:%M:%S").to_string());
    let description = describe_file(file);

    let mut value = json!({
        "file": file.display().to_string(),
        "size": metadata.len(),
        "modified": modified,
        "kind": description.kind,
        "tag_format": description.tag_format.map(|f| f.name()),
    });

    if let Some(obj) = value.as_object_mut() {
        match read_tag(file, config) {
            Ok(record) => {
                let fields = StandardField::ALL.iter().filter(|f| record.get(**f).is_some()).count();
                obj.insert("fields".to_string(), json!(fields));
                obj.insert("pictures".to_string(), json!(record.pictures.len()));
                obj.insert("needs_normalizing".to_string(), json!(record.dirty));
            }
            Err(e) => {
                obj.insert("error".to_string(), json!(e.to_string()));
            }
        }
    }
    Ok(value)
}

fn command_info(files: &[PathBuf], config: &TagConfig, formatter: &OutputFormatter) -> anyhow::Result<()> {
    let mut stdout = io::stdout().lock();
    for file in files {
        let value = file_info(file, config)?;
        formatter.output(None, &value, &mut stdout)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_field_edits() {
        let edits = FieldEdits::parse(
            &["title=A = B".to_string(), "track=3".to_string()],
            &["comment".to_string()],
        )
        .unwrap();

        let mut record = TagRecord::new();
        record.set(StandardField::Comment, Some("old".to_string()));
        edits.apply(&mut record);
        assert_eq!(record.title.as_deref(), Some("A = B"));
        assert_eq!(record.track.as_deref(), Some("3"));
        assert_eq!(record.comment, None);
    }

    #[test]
    fn test_field_edits_reject_unknown() {
        assert!(FieldEdits::parse(&["mood=happy".to_string()], &[]).is_err());
        assert!(FieldEdits::parse(&["title".to_string()], &[]).is_err());
    }

    #[test]
    fn test_record_json_summarizes_pictures() {
        let mut record = TagRecord::new();
        record.set(StandardField::Title, Some("Song".to_string()));
        record.add_picture(Picture::new(PictureType::CoverFront, vec![0xFF, 0xD8, 0xFF, 0xE0]));

        let mut value = record_json(&record).unwrap();
        assert_eq!(value["pictures"][0]["mime_type"], "image/jpeg");
        assert_eq!(value["pictures"][0]["size"], 4);

        filter_fields(&mut value, "title");
        assert_eq!(value, json!({"title": "Song"}));
    }

    #[test]
    fn test_select_pictures() {
        let pictures = vec![Picture::new(PictureType::CoverFront, vec![1]), Picture::new(PictureType::CoverBack, vec![2])];
        assert_eq!(select_pictures(&pictures, None).unwrap().len(), 2);
        assert_eq!(select_pictures(&pictures, Some(1)).unwrap()[0].0, 1);
        assert!(select_pictures(&pictures, Some(2)).is_err());
    }

    #[test]
    fn test_write_then_info() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.mp3");
        fs::write(&path, b"\xFF\xFB\x90\x00frames").unwrap();
        let config = TagConfig::default();
        let formatter = OutputFormatter::new(Default::default(), true);

        command_write(&path, &["title=Song".to_string()], &[], None, &config, &formatter).unwrap();
        assert_eq!(read_tag(&path, &config).unwrap().title.as_deref(), Some("Song"));

        let info = file_info(&path, &config).unwrap();
        assert_eq!(info["fields"], 1);
        assert_eq!(info["tag_format"], "ID3");
    }
}
