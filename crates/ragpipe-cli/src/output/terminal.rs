//! Terminal output formatter

use super::ReportOptions;
use ragpipe_core::{GenerationPath, Metrics, PipelineReport, QueryReport};

pub fn format_report(report: &PipelineReport, options: &ReportOptions) -> String {
    let mut output = String::new();

    output.push_str("\nPipeline report\n");
    if let Some(ref document) = report.document {
        output.push_str(&format!("  Document:      {}\n", document));
    }
    if let Some(chunks) = report.chunks_count {
        output.push_str(&format!("  Chunks:        {}\n", chunks));
    }
    output.push_str(&format!("  Service:       {}\n", report.service_url));

    output.push_str("\nStage latency (service reported)\n");
    output.push_str(&stage_table(&report.metrics));
    match report.total_time {
        Some(total) => output.push_str(&format!("  {:<12}{:>9.2}s\n", "total", total)),
        None => output.push_str("  no stage has completed\n"),
    }
    output.push_str(&format!(
        "  {:<12}{:>9.2}s\n",
        "wall clock",
        report.wall_time()
    ));
    if let Some(rate) = report
        .metrics
        .generation
        .as_ref()
        .and_then(|g| g.tokens_per_sec)
    {
        output.push_str(&format!("  {:<12}{:>9.1} tok/s\n", "throughput", rate));
    }

    for (i, query) in report.queries.iter().enumerate() {
        output.push_str(&format!("\nQuery {}: {}\n", i + 1, query.query));
        output.push_str(&query_section(query, options));
    }

    output
}

fn stage_table(metrics: &Metrics) -> String {
    let mut output = String::new();
    for (stage, time) in metrics.stage_times() {
        match time {
            Some(t) => output.push_str(&format!("  {:<12}{:>9.2}s\n", stage, t)),
            None => output.push_str(&format!("  {:<12}{:>10}\n", stage, "-")),
        }
    }
    output
}

fn query_section(query: &QueryReport, options: &ReportOptions) -> String {
    let mut output = String::new();

    if let Some(ref error) = query.error {
        output.push_str(&format!("  failed: {}\n", error));
    }
    if let Some(ref retrieval) = query.retrieval {
        let mut parts = vec![format!("total {:.2}s", retrieval.total_time)];
        if let Some(t) = retrieval.reranking_time {
            parts.push(format!("rerank {:.2}s", t));
        }
        if let Some(t) = retrieval.vector_search_time {
            parts.push(format!("search {:.2}s", t));
        }
        output.push_str(&format!("  retrieval:  {}\n", parts.join(", ")));
    }
    if let Some(ref generation) = query.generation {
        let path = match query.path {
            Some(GenerationPath::Streamed) => "streamed",
            Some(GenerationPath::Fallback) => "fallback",
            Some(GenerationPath::Blocking) | None => "blocking",
        };
        let mut line = format!("  generation: {:.2}s ({})", generation.generation_time, path);
        if let Some(tokens) = generation.token_count {
            line.push_str(&format!(", {} tokens", tokens));
        }
        if let Some(rate) = generation.tokens_per_sec {
            line.push_str(&format!(", {:.1} tok/s", rate));
        }
        output.push_str(&line);
        output.push('\n');
    }

    if options.sources && !query.sources.is_empty() {
        output.push_str("  sources:\n");
        for (rank, source) in query.sources.iter().enumerate() {
            let score_pct = (source.score * 100.0).round() as i64;
            output.push_str(&format!(
                "  {:>3}. {:>3}% {} p.{}\n",
                rank + 1,
                score_pct,
                source.source,
                source.page
            ));
        }
    }

    output
}
