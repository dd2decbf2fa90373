//! Run command: one full pipeline session

use crate::app::{OutputFormat, RunArgs};
use crate::output::{self, ReportOptions};
use crate::progress::ProgressReporter;
use anyhow::{anyhow, Context, Result};
use ragpipe_core::{
    GenerationPath, GenerationResult, HttpStageClient, Operation, PipelineController,
    PipelineReport, PipelineState, QueryReport, StageClient,
};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;

pub async fn run(args: RunArgs, url: Option<&str>, format: OutputFormat) -> Result<()> {
    let mut config = super::load_config(url)?;
    if let Some(top_k) = args.top_k {
        config.set("retrieval.top_k", &top_k.to_string())?;
    }
    if args.no_stream {
        config.generation.streaming = false;
    }
    let overrides = [
        ("models.chunking_model", &args.chunking_model),
        ("models.embedding_model", &args.embedding_model),
        ("models.reranker_model", &args.reranker_model),
        ("models.generation_model", &args.generation_model),
    ];
    for (key, value) in overrides {
        if let Some(value) = value {
            config.set(key, value)?;
        }
    }

    let filename = file_name(&args.file)?;
    let bytes = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let client = Arc::new(super::client(&config)?);
    let mut pipeline =
        PipelineController::new(client.clone() as Arc<dyn StageClient>, &config);

    let printer = Arc::new(Mutex::new(AnswerPrinter::new(format == OutputFormat::Cli)));
    let observer = tokio::spawn(observe(pipeline.subscribe(), printer.clone()));

    let session = run_session(&mut pipeline, &printer, &filename, bytes, &args.queries).await;
    let report = session.map(|queries| {
        PipelineReport::from_state(client.base_url(), pipeline.state(), queries)
    });

    // Closing the channel ends the observer
    drop(pipeline);
    observer.await.ok();

    let report = report?;
    let options = ReportOptions {
        sources: !args.no_sources,
    };
    print!("{}", output::format_report(&report, format, &options)?);
    log_request_stats(&client);

    match report.failed_queries() {
        0 => Ok(()),
        n => Err(anyhow!("{} of {} queries failed", n, report.queries.len())),
    }
}

async fn run_session(
    pipeline: &mut PipelineController,
    printer: &Mutex<AnswerPrinter>,
    filename: &str,
    bytes: Vec<u8>,
    queries: &[String],
) -> Result<Vec<QueryReport>> {
    if let Some(catalog) = pipeline.start_session().await? {
        tracing::info!("Models offered: {}", catalog.all.join(", "));
    }
    let models = pipeline.models();
    tracing::info!(
        "Using chunking={} embedding={} reranker={} generation={}",
        models.chunking_model,
        models.embedding_model,
        models.reranker_model,
        models.generation_model
    );

    pipeline.upload(filename, bytes).await?;
    let summary = pipeline.ingest().await?;
    tracing::info!(
        "Ingested {} chunks ({} embedded)",
        summary.chunks_count,
        summary.embedded.unwrap_or(summary.chunks_count)
    );

    let mut reports = Vec::with_capacity(queries.len());
    for query in queries {
        reports.push(run_query(pipeline, printer, query).await);
    }
    Ok(reports)
}

/// Retrieve then generate; failures are recorded, not propagated
async fn run_query(
    pipeline: &mut PipelineController,
    printer: &Mutex<AnswerPrinter>,
    query: &str,
) -> QueryReport {
    let report = QueryReport::new(query);

    let chunks = match pipeline.retrieve(query).await {
        Ok(chunks) => chunks,
        Err(e) => return report.with_error(e),
    };
    let report = report.with_retrieval(&chunks, pipeline.state().metrics.retrieval.as_ref());

    lock(printer).open(query);
    let result = pipeline.generate(query).await;
    lock(printer).close(result.as_ref().ok());

    match result {
        Ok(result) => report.with_generation(&result),
        Err(e) => report.with_error(e),
    }
}

/// Mirror pipeline snapshots to the terminal until the controller is dropped
async fn observe(mut rx: watch::Receiver<PipelineState>, printer: Arc<Mutex<AnswerPrinter>>) {
    let mut progress = ProgressReporter::new();

    while rx.changed().await.is_ok() {
        let mut guard = lock(&printer);
        let state = rx.borrow_and_update();

        let generating = state.stage.in_flight() == Some(Operation::Generate);
        match state.progress {
            Some(ref snapshot) if !generating => progress.show(snapshot),
            _ => progress.finish(),
        }
        if state.streaming {
            guard.stream(&state.answer);
        }
    }
    progress.finish();
}

/// Writes answers to stdout as they arrive.
///
/// Shared between the observer task and the command; holding the lock while
/// reading the latest snapshot keeps stale stream text out of a new answer.
struct AnswerPrinter {
    enabled: bool,
    open: bool,
    shown: String,
}

impl AnswerPrinter {
    fn new(enabled: bool) -> Self {
        Self {
            enabled,
            open: false,
            shown: String::new(),
        }
    }

    fn open(&mut self, query: &str) {
        self.open = true;
        self.shown.clear();
        if self.enabled {
            eprintln!("\n> {}", query);
        }
    }

    /// Print whatever part of a streamed answer is new
    fn stream(&mut self, answer: &str) {
        if !self.open {
            return;
        }
        if !answer.starts_with(self.shown.as_str()) {
            // Stream abandoned; the blocking answer is printed on close
            self.restart();
            return;
        }
        let delta = &answer[self.shown.len()..];
        if !delta.is_empty() {
            self.write(delta);
            self.shown.push_str(delta);
        }
    }

    fn close(&mut self, result: Option<&GenerationResult>) {
        if let Some(result) = result {
            if result.path == GenerationPath::Fallback && !self.shown.is_empty() {
                self.restart();
            }
            self.stream(&result.answer);
            if !self.shown.starts_with(result.answer.as_str()) {
                self.restart();
                self.stream(&result.answer);
            }
        }
        if self.enabled && !self.shown.is_empty() {
            println!();
        }
        self.open = false;
        self.shown.clear();
    }

    fn restart(&mut self) {
        if self.enabled && !self.shown.is_empty() {
            println!();
            eprintln!("(stream interrupted, retrying without streaming)");
        }
        self.shown.clear();
    }

    fn write(&self, text: &str) {
        if self.enabled {
            print!("{}", text);
            io::stdout().flush().ok();
        }
    }
}

fn lock(printer: &Mutex<AnswerPrinter>) -> std::sync::MutexGuard<'_, AnswerPrinter> {
    printer.lock().unwrap_or_else(PoisonError::into_inner)
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Not a file path: {}", path.display()))
}

fn log_request_stats(client: &HttpStageClient) {
    let stats = client.stats();
    tracing::info!(
        "{} requests, {} errors, {:.1}ms average latency",
        stats.total_requests,
        stats.total_errors,
        stats.avg_latency_ms
    );
}
