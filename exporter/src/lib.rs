use std::path::{Path, PathBuf};

use futures::StreamExt;

use analysis::{
    decoder::{Handler, RunError},
    demo::{Demo, DemoError},
    recording::{DecodeError, Recording},
    sink::{CsvSink, SinkError},
    timeline::{Summary, Timeline},
};

/// Inputs with this extension are read as recordings instead of demos.
const RECORDING_EXTENSION: &str = "jsonl";

#[derive(Debug, Clone)]
pub struct Config {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Extension of the inputs to pick up, without the leading dot.
    pub extension: String,
    pub workers: usize,
    pub timeline: analysis::timeline::Config,
    pub demo: analysis::demo::Config,
}

/// Why the content of an input could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error(transparent)]
    Recording(#[from] DecodeError),
    #[error(transparent)]
    Demo(#[from] DemoError),
}

/// Why a single file could not be exported.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Opening input {path:?}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Parsing header: {0}")]
    Header(#[source] InputError),
    #[error("Creating output {path:?}: {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Decoding: {0}")]
    Decode(#[source] InputError),
    #[error("Writing output: {0}")]
    Sink(#[from] SinkError),
    #[error("Panicked: {0}")]
    Panic(String),
}

/// Errors that prevent the batch from starting at all.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("Reading input directory {path:?}: {source}")]
    InputDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Creating output directory {path:?}: {source}")]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug)]
pub struct FileOutcome {
    pub input: PathBuf,
    pub output: PathBuf,
    pub result: Result<Summary, ExportError>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub files: Vec<FileOutcome>,
}

impl BatchReport {
    pub fn failed(&self) -> impl Iterator<Item = &FileOutcome> + '_ {
        self.files.iter().filter(|f| f.result.is_err())
    }

    pub fn succeeded(&self) -> usize {
        self.files.iter().filter(|f| f.result.is_ok()).count()
    }
}

/// All files in the input directory with the configured extension, sorted
/// by path.
pub fn discover(config: &Config) -> Result<Vec<PathBuf>, BatchError> {
    let read_err = |source| BatchError::InputDir {
        path: config.input_dir.clone(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(&config.input_dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        if !path.is_file() {
            continue;
        }

        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(&config.extension))
            .unwrap_or(false);
        if matches {
            files.push(path);
        }
    }
    files.sort();

    Ok(files)
}

/// `<output_dir>/<input base name>.csv`
pub fn output_path(output_dir: &Path, input: &Path) -> PathBuf {
    let mut name = input
        .file_stem()
        .unwrap_or(input.as_os_str())
        .to_os_string();
    name.push(".csv");

    output_dir.join(name)
}

fn is_recording(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(RECORDING_EXTENSION))
        .unwrap_or(false)
}

/// An input file, decoded according to its extension.
enum Input<'b> {
    Demo(Demo<'b>),
    Recording(Recording<'b>),
}

impl<'b> Input<'b> {
    fn parse(config: &Config, path: &Path, buf: &'b [u8]) -> Result<Self, InputError> {
        if is_recording(path) {
            Ok(Self::Recording(Recording::parse(buf)?))
        } else {
            Ok(Self::Demo(Demo::parse(&config.demo, buf)?))
        }
    }

    fn tick_rate(&self) -> f64 {
        match self {
            Self::Demo(demo) => demo.tick_rate(),
            Self::Recording(recording) => recording.header().tick_rate,
        }
    }

    fn run<H>(self, handler: &mut H) -> Result<(), RunError<H::Error>>
    where
        H: Handler,
    {
        match self {
            Self::Demo(demo) => demo.run(handler),
            Self::Recording(recording) => recording.run(handler),
        }
    }
}

/// Exports a single demo or recording into `output`.
///
/// The input is checked before the output is created, an unreadable input
/// leaves nothing behind. Once rows are being written they are kept, even if
/// the input turns out to be broken further in.
#[tracing::instrument(name = "Export", skip(config, input, output), fields(input = %input.display()))]
pub fn export_file(config: &Config, input: &Path, output: &Path) -> Result<Summary, ExportError> {
    tracing::info!("Processing file");

    let open_err = |source| ExportError::Open {
        path: input.to_path_buf(),
        source,
    };
    let file = std::fs::File::open(input).map_err(open_err)?;
    if file.metadata().map_err(open_err)?.len() == 0 {
        let empty = if is_recording(input) {
            InputError::Recording(DecodeError::Empty)
        } else {
            InputError::Demo(DemoError::Empty)
        };
        return Err(ExportError::Header(empty));
    }
    let mmap = unsafe { memmap2::MmapOptions::new().map(&file) }.map_err(open_err)?;

    let source = Input::parse(config, input, &mmap).map_err(ExportError::Header)?;

    let output_file = std::fs::File::create(output).map_err(|source| ExportError::Create {
        path: output.to_path_buf(),
        source,
    })?;
    let sink = CsvSink::new(std::io::BufWriter::new(output_file))?;

    let mut timeline = Timeline::new(&config.timeline, source.tick_rate(), sink);
    let replay = source.run(&mut timeline);
    let finished = timeline.finish();

    let failure = match replay {
        Ok(()) => None,
        Err(RunError::Decode(e)) => Some(InputError::from(e)),
        Err(RunError::Demo(e)) => Some(InputError::from(e)),
        Err(RunError::Handler(e)) => return Err(ExportError::Sink(e)),
    };
    if let Some(e) = failure {
        if let Ok((_, summary)) = &finished {
            tracing::warn!(rows = summary.rows, output = %output.display(), "Output is incomplete");
        }
        return Err(ExportError::Decode(e));
    }

    let (_, summary) = finished?;

    tracing::info!(
        windows = summary.windows,
        rows = summary.rows,
        rounds = summary.rounds,
        "Finished processing file"
    );

    Ok(summary)
}

fn panic_message(err: tokio::task::JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }

    let payload = err.into_panic();
    if let Some(msg) = payload.downcast_ref::<&str>() {
        return (*msg).to_owned();
    }
    if let Some(msg) = payload.downcast_ref::<String>() {
        return msg.clone();
    }

    "unknown panic".to_owned()
}

/// Exports every discovered recording, `config.workers` at a time.
///
/// A failing file, including one that panics, is reported in the returned
/// report and does not affect the other files.
pub async fn run_batch(config: std::sync::Arc<Config>) -> Result<BatchReport, BatchError> {
    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .map_err(|source| BatchError::OutputDir {
            path: config.output_dir.clone(),
            source,
        })?;

    let inputs = discover(&config)?;
    tracing::info!(
        files = inputs.len(),
        workers = config.workers,
        "Starting export of {:?}",
        config.input_dir
    );

    let mut files: Vec<FileOutcome> = futures::stream::iter(inputs)
        .map(|input| {
            let config = config.clone();

            async move {
                let output = output_path(&config.output_dir, &input);

                let task_input = input.clone();
                let task_output = output.clone();
                let result = tokio::task::spawn_blocking(move || {
                    export_file(&config, &task_input, &task_output)
                })
                .await
                .unwrap_or_else(|e| Err(ExportError::Panic(panic_message(e))));

                if let Err(e) = result.as_ref() {
                    tracing::error!("Processing {:?}: {}", input, e);
                }

                FileOutcome {
                    input,
                    output,
                    result,
                }
            }
        })
        .buffer_unordered(config.workers.max(1))
        .collect()
        .await;
    files.sort_by(|a, b| a.input.cmp(&b.input));

    Ok(BatchReport { files })
}
