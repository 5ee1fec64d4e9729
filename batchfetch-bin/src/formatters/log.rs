use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};
use log::LevelFilter;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::{
    options::{LogConfig, LogFormat},
    verbosity::Verbosity,
};

/// Initialize the logging system with the given verbosity level and
/// destinations.
///
/// Log messages go to stderr unless `--no-console-log` is given, and
/// additionally to the log file if one is configured.
pub(crate) fn init_logging(verbose: &Verbosity, config: &LogConfig) -> Result<()> {
    // Set a base level for all modules to `warn`, which is a reasonable default.
    // It will be overridden by RUST_LOG if it's set.
    let env = Env::default().filter_or("RUST_LOG", "warn");

    let mut builder = Builder::from_env(env);

    if std::env::var("RUST_LOG").is_err() {
        // Dependencies (hyper, reqwest) only report warnings and errors,
        // our own crates follow `-v`/`-q`.
        let level_filter = verbose.log_level_filter();
        builder
            .filter_level(LevelFilter::Warn)
            .filter_module("batchfetch", level_filter)
            .filter_module("batchfetch_lib", level_filter);
    }

    match config.format {
        LogFormat::Plain => {
            builder.format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()));
        }
        LogFormat::Timestamped => {
            builder.format(|buf, record| {
                let timestamp = buf.timestamp_millis();
                writeln!(buf, "{timestamp} [{}] {}", record.level(), record.args())
            });
        }
    }

    builder.target(target(config)?);
    builder.init();
    Ok(())
}

/// Where formatted log lines are written to
fn target(config: &LogConfig) -> Result<Target> {
    let file = config
        .file
        .as_deref()
        .map(|path| RotatingFile::open(path, config.max_bytes, config.backup_count))
        .transpose()?;
    let target = match (file, config.no_console) {
        (None, false) => Target::Stderr,
        (Some(file), true) => Target::Pipe(Box::new(file)),
        (Some(file), false) => Target::Pipe(Box::new(Tee::new(vec![
            Box::new(io::stderr()),
            Box::new(file),
        ]))),
        (None, true) => Target::Pipe(Box::new(io::sink())),
    };
    Ok(target)
}

/// Open `path` for appending, creating missing parent directories
fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create log directory `{}`", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Cannot open log file `{}`", path.display()))
}

/// Log file that is rotated once it would grow beyond `max_bytes`.
///
/// On rotation `<file>.1` becomes `<file>.2` and so on, the current file
/// becomes `<file>.1` and a fresh file is started. At most `backup_count`
/// rotated files are kept. Without backups the file is truncated instead.
struct RotatingFile {
    path: PathBuf,
    file: File,
    len: u64,
    max_bytes: u64,
    backup_count: usize,
}

impl RotatingFile {
    fn open(path: &Path, max_bytes: u64, backup_count: usize) -> Result<Self> {
        let file = open_log_file(path)?;
        let len = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            file,
            len,
            max_bytes,
            backup_count,
        })
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(format!(".{index}"));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        if self.backup_count == 0 {
            self.file.set_len(0)?;
        } else {
            for index in (1..self.backup_count).rev() {
                let from = self.backup_path(index);
                if from.exists() {
                    fs::rename(&from, self.backup_path(index + 1))?;
                }
            }
            fs::rename(&self.path, self.backup_path(1))?;
            self.file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
        }
        self.len = 0;
        Ok(())
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let incoming = buf.len() as u64;
        if self.max_bytes > 0 && self.len > 0 && self.len + incoming > self.max_bytes {
            self.rotate()?;
        }
        let written = self.file.write(buf)?;
        self.len += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Writes every buffer to all of its sinks
struct Tee {
    sinks: Vec<Box<dyn Write + Send>>,
}

impl Tee {
    fn new(sinks: Vec<Box<dyn Write + Send>>) -> Self {
        Self { sinks }
    }
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for sink in &mut self.sinks {
            sink.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        for sink in &mut self.sinks {
            sink.flush()?;
        }
        Ok(())
    }
}
