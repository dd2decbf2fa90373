//! Controller scenarios against a scripted stage client

mod common;

use common::{test_config, FakeClient, StreamScript};
use ragpipe_core::{
    GenerationPath, Operation, PipelineController, RagPipeError, Stage, StreamEvent,
};
use std::sync::Arc;

fn controller(client: &Arc<FakeClient>) -> PipelineController {
    PipelineController::new(client.clone(), &test_config())
}

/// Upload, ingest and retrieve, leaving the controller in Generate
async fn ready_to_generate(client: &Arc<FakeClient>) -> PipelineController {
    let mut pipeline = controller(client);
    pipeline.upload("guide.pdf", b"%PDF".to_vec()).await.unwrap();
    pipeline.ingest().await.unwrap();
    pipeline.retrieve("x").await.unwrap();
    assert_eq!(pipeline.stage(), Stage::Generate);
    pipeline
}

#[tokio::test]
async fn test_scenario_streamed_end_to_end() {
    let client = Arc::new(FakeClient::new());
    let mut pipeline = controller(&client);
    assert_eq!(pipeline.stage(), Stage::Upload);

    pipeline.upload("guide.pdf", b"%PDF".to_vec()).await.unwrap();
    assert_eq!(pipeline.stage(), Stage::Process);

    let summary = pipeline.ingest().await.unwrap();
    assert_eq!(summary.chunks_count, 12);
    assert_eq!(pipeline.stage(), Stage::Retrieve);

    let chunks = pipeline.retrieve("x").await.unwrap();
    assert_eq!(chunks.len(), 5);
    assert_eq!(pipeline.stage(), Stage::Generate);

    let result = pipeline.generate("x").await.unwrap();
    assert_eq!(result.answer, "Hi there");
    assert_eq!(result.path, GenerationPath::Streamed);

    let state = pipeline.state();
    assert_eq!(state.answer, "Hi there");
    assert_eq!(state.tokens_per_sec, Some(42.0));
    assert!(!state.streaming);
    assert!(!state.stage.is_busy());

    let metrics = &state.metrics;
    assert_eq!(metrics.ingestion.as_ref().unwrap().total_time, 1.5);
    assert_eq!(metrics.embedding.as_ref().unwrap().total_time, 0.8);
    assert!(metrics.retrieval.is_some());
    let generation = metrics.generation.as_ref().unwrap();
    assert_eq!(generation.generation_time, 2.1);
    assert_eq!(generation.token_count, Some(8));
    assert_eq!(generation.tokens_per_sec, Some(40.5));

    assert_eq!(client.count("generate"), 0);
    assert_eq!(
        client.calls(),
        vec!["upload", "process", "embed", "retrieve", "generate_stream"]
    );
}

#[tokio::test]
async fn test_scenario_stream_drop_falls_back_once() {
    let client = Arc::new(FakeClient::new());
    let mut pipeline = ready_to_generate(&client).await;

    client.set_stream(StreamScript::DropAfter(vec![StreamEvent::Content(
        "Partial".to_string(),
    )]));

    let result = pipeline.generate("x").await.unwrap();
    assert_eq!(result.answer, "Full answer.");
    assert_eq!(result.path, GenerationPath::Fallback);
    assert_eq!(pipeline.state().answer, "Full answer.");
    assert!(!pipeline.state().answer.contains("Partial"));

    let generation = pipeline.state().metrics.generation.as_ref().unwrap();
    assert_eq!(generation.generation_time, 3.0);
    assert_eq!(client.count("generate_stream"), 1);
    assert_eq!(client.count("generate"), 1);

    let requests = client.generate_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0], requests[1]);
}

#[tokio::test]
async fn test_stream_ending_without_done_falls_back() {
    let client = Arc::new(FakeClient::new());
    let mut pipeline = ready_to_generate(&client).await;

    client.set_stream(StreamScript::Events(vec![
        StreamEvent::Content("Hi".to_string()),
        StreamEvent::Throughput(10.0),
    ]));

    let result = pipeline.generate("x").await.unwrap();
    assert_eq!(result.answer, "Full answer.");
    assert_eq!(pipeline.state().tokens_per_sec, None);
    assert_eq!(client.count("generate"), 1);
}

#[tokio::test]
async fn test_refused_stream_falls_back_exactly_once() {
    let client = Arc::new(FakeClient::new());
    let mut pipeline = ready_to_generate(&client).await;
    client.set_stream(StreamScript::Refuse);

    let result = pipeline.generate("x").await.unwrap();
    assert_eq!(result.answer, "Full answer.");
    assert_eq!(client.count("generate_stream"), 1);
    assert_eq!(client.count("generate"), 1);
}

#[tokio::test]
async fn test_fallback_failure_records_no_metrics() {
    let client = Arc::new(FakeClient::new());
    let mut pipeline = ready_to_generate(&client).await;
    client.set_stream(StreamScript::Refuse);
    client.fail("generate");

    let err = pipeline.generate("x").await.unwrap_err();
    assert!(matches!(err, RagPipeError::ExternalError(_)));
    assert_eq!(client.count("generate"), 1);

    let state = pipeline.state();
    assert!(state.metrics.generation.is_none());
    assert!(state.answer.is_empty());
    assert!(!state.stage.is_busy());
    assert_eq!(state.stage.stage(), Stage::Generate);
    assert_eq!(
        state.last_error.as_ref().map(|f| f.operation),
        Some(Operation::Generate)
    );
}

#[tokio::test]
async fn test_repeated_generation_resets_answer() {
    let client = Arc::new(FakeClient::new());
    let mut pipeline = ready_to_generate(&client).await;

    pipeline.generate("x").await.unwrap();
    client.set_stream(StreamScript::Events(vec![
        StreamEvent::Content("Second".to_string()),
        StreamEvent::Done(Default::default()),
    ]));
    let result = pipeline.generate("y").await.unwrap();

    assert_eq!(result.answer, "Second");
    assert_eq!(pipeline.state().answer, "Second");
    assert_eq!(pipeline.state().tokens_per_sec, None);
    assert_eq!(pipeline.stage(), Stage::Generate);
}

#[tokio::test]
async fn test_streaming_disabled_uses_blocking_path() {
    let client = Arc::new(FakeClient::new());
    let mut pipeline = ready_to_generate(&client).await;
    pipeline.set_streaming(false);

    let result = pipeline.generate("x").await.unwrap();
    assert_eq!(result.path, GenerationPath::Blocking);
    assert_eq!(client.count("generate_stream"), 0);
    assert_eq!(client.count("generate"), 1);
}

#[tokio::test]
async fn test_context_joins_chunks_in_rank_order() {
    let client = Arc::new(FakeClient::new());
    let mut pipeline = ready_to_generate(&client).await;
    pipeline.generate("x").await.unwrap();

    let request = &client.generate_requests()[0];
    assert_eq!(
        request.context,
        "chunk 0\n\nchunk 1\n\nchunk 2\n\nchunk 3\n\nchunk 4"
    );
    assert_eq!(request.model, "llama3.1:8b");
    assert_eq!(client.retrieve_requests()[0].top_k, 5);
}

#[tokio::test]
async fn test_stages_never_regress() {
    let client = Arc::new(FakeClient::new());
    let mut pipeline = ready_to_generate(&client).await;

    let err = pipeline.ingest().await.unwrap_err();
    assert!(matches!(
        err,
        RagPipeError::InvalidStage {
            operation: Operation::Ingest,
            stage: Stage::Generate
        }
    ));

    pipeline.retrieve("another question").await.unwrap();
    pipeline.retrieve("and another").await.unwrap();
    assert_eq!(pipeline.stage(), Stage::Generate);
    assert_eq!(client.count("process"), 1);
    assert_eq!(client.count("embed"), 1);
    assert_eq!(client.count("retrieve"), 3);
}

#[tokio::test]
async fn test_operations_out_of_order_are_rejected() {
    let client = Arc::new(FakeClient::new());
    let mut pipeline = controller(&client);

    assert!(matches!(
        pipeline.retrieve("x").await,
        Err(RagPipeError::InvalidStage { .. })
    ));
    assert!(matches!(
        pipeline.ingest().await,
        Err(RagPipeError::InvalidStage { .. })
    ));
    assert!(matches!(
        pipeline.generate("x").await,
        Err(RagPipeError::InvalidStage { .. })
    ));
    assert!(client.calls().is_empty());
    assert!(!pipeline.state().stage.is_busy());
}

#[tokio::test]
async fn test_embed_failure_keeps_stage_and_ingestion_metrics() {
    let client = Arc::new(FakeClient::new());
    let mut pipeline = controller(&client);
    pipeline.upload("guide.pdf", Vec::new()).await.unwrap();

    client.fail("embed");
    assert!(pipeline.ingest().await.is_err());

    let state = pipeline.state();
    assert_eq!(state.stage.stage(), Stage::Process);
    assert!(!state.stage.is_busy());
    assert!(state.metrics.ingestion.is_some());
    assert!(state.metrics.embedding.is_none());
    assert!(state.progress.is_none());

    client.heal("embed");
    pipeline.ingest().await.unwrap();
    assert_eq!(pipeline.stage(), Stage::Retrieve);
    assert!(pipeline.state().last_error.is_none());
}

#[tokio::test]
async fn test_retrieve_failure_does_not_advance() {
    let client = Arc::new(FakeClient::new());
    let mut pipeline = controller(&client);
    pipeline.upload("guide.pdf", Vec::new()).await.unwrap();
    pipeline.ingest().await.unwrap();

    client.fail("retrieve");
    assert!(pipeline.retrieve("x").await.is_err());
    assert_eq!(pipeline.stage(), Stage::Retrieve);
    assert!(pipeline.state().metrics.retrieval.is_none());
}

#[tokio::test]
async fn test_new_upload_starts_fresh_session() {
    let client = Arc::new(FakeClient::new());
    let mut pipeline = ready_to_generate(&client).await;
    pipeline.generate("x").await.unwrap();
    assert!(pipeline.state().metrics.generation.is_some());

    pipeline.upload("other.txt", b"hello".to_vec()).await.unwrap();
    let state = pipeline.state();
    assert_eq!(state.stage.stage(), Stage::Process);
    assert!(state.metrics.is_empty());
    assert!(state.chunks.is_empty());
    assert!(state.answer.is_empty());
    assert_eq!(state.filename.as_deref(), Some("other.txt"));
}

#[tokio::test]
async fn test_failed_upload_keeps_current_session() {
    let client = Arc::new(FakeClient::new());
    let mut pipeline = ready_to_generate(&client).await;

    client.fail("upload");
    assert!(pipeline.upload("other.txt", Vec::new()).await.is_err());
    assert_eq!(pipeline.stage(), Stage::Generate);
    assert!(pipeline.state().metrics.retrieval.is_some());
}

#[tokio::test]
async fn test_observers_see_final_state() {
    let client = Arc::new(FakeClient::new());
    let mut pipeline = ready_to_generate(&client).await;
    let receiver = pipeline.subscribe();

    pipeline.generate("x").await.unwrap();

    let seen = receiver.borrow().clone();
    assert_eq!(seen.answer, "Hi there");
    assert!(seen.metrics.generation.is_some());
    assert!(!seen.stage.is_busy());
}

#[tokio::test]
async fn test_start_session_seeds_models_and_tolerates_reset_failure() {
    let client = Arc::new(FakeClient::new());
    let mut config = test_config();
    config.models.embedding_model.clear();
    config.models.generation_model.clear();
    let mut pipeline = PipelineController::new(client.clone(), &config);

    client.fail("reset");
    let catalog = pipeline.start_session().await.unwrap();

    assert!(catalog.is_some());
    assert_eq!(pipeline.models().embedding_model, "qwen3-embedding:4b");
    assert_eq!(pipeline.models().generation_model, "llama3.1:8b");
    assert_eq!(pipeline.stage(), Stage::Upload);
    assert_eq!(client.calls(), vec!["reset", "models"]);
}

#[tokio::test]
async fn test_missing_model_is_config_error() {
    let client = Arc::new(FakeClient::new());
    let mut pipeline = ready_to_generate(&client).await;
    let mut models = pipeline.models().clone();
    models.generation_model = String::new();
    pipeline.set_models(models);

    let err = pipeline.generate("x").await.unwrap_err();
    assert!(matches!(err, RagPipeError::Config(_)));
    assert_eq!(client.count("generate_stream"), 0);
    assert!(!pipeline.state().stage.is_busy());
}

#[tokio::test]
async fn test_wall_clock_timings_recorded() {
    let client = Arc::new(FakeClient::new());
    let mut pipeline = ready_to_generate(&client).await;
    pipeline.generate("x").await.unwrap();

    let ops: Vec<Operation> = pipeline
        .state()
        .timings
        .iter()
        .map(|t| t.operation)
        .collect();
    assert_eq!(
        ops,
        vec![
            Operation::Upload,
            Operation::Ingest,
            Operation::Retrieve,
            Operation::Generate
        ]
    );
}
