use std::sync::Arc;
use std::time::Duration;

use doc_triage::config::Config;
use doc_triage::extract::PlainTextExtractor;
use doc_triage::llm::{InferenceClient, OllamaClient};
use doc_triage::pipeline::classifier::Classifier;
use doc_triage::pipeline::correspondence::CorrespondenceAnalyzer;
use doc_triage::pipeline::processor::{DocumentProcessor, FileOutcome};
use doc_triage::pipeline::router::Router;
use doc_triage::pipeline::rules::{document_rules, intent_rules, urgency_rules};
use doc_triage::pipeline::validator::invoice_shape;
use doc_triage::store::MemoryStore;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Initialize tracing: console plus a daily-rolling file in log_dir
    std::fs::create_dir_all(&config.log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&config.log_dir, "doc-triage.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    eprintln!("📄 Doc Triage v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Inference: {}", config.inference_url);
    eprintln!("   Model: {}", config.classifier.model);
    eprintln!("   Input dir: {}", config.input_dir.display());
    eprintln!("   Memory store: {}", config.store_path.display());
    eprintln!("   Logs: {}\n", config.log_dir.display());

    let store = MemoryStore::open(&config.store_path).await?;

    // The HTTP-level timeout sits above the per-call budget so the
    // pipeline's own timeout fires first.
    let client: Arc<dyn InferenceClient> = Arc::new(OllamaClient::new(
        config.inference_url.clone(),
        config.classifier.request_timeout + Duration::from_secs(2),
    ));
    let mut processor = DocumentProcessor::new(
        Router::new(Arc::new(PlainTextExtractor)),
        Classifier::new(
            Arc::clone(&client),
            config.classifier.clone(),
            document_rules(),
        ),
        CorrespondenceAnalyzer::new(
            client,
            config.classifier.clone(),
            intent_rules(),
            urgency_rules(),
        ),
        invoice_shape(),
        store,
    );

    let summary = processor.process_dir(&config.input_dir).await?;

    eprintln!(
        "\nProcessed {} file(s): {} recorded, {} failed",
        summary.outcomes.len(),
        summary.recorded(),
        summary.failed(),
    );
    for (path, outcome) in &summary.outcomes {
        match outcome {
            FileOutcome::Recorded {
                conversation_id,
                status,
                ..
            } => eprintln!("   {} -> {:?} ({})", path.display(), status, conversation_id),
            FileOutcome::Failed { error } => eprintln!("   {} -> skipped: {}", path.display(), error),
        }
    }
    eprintln!(
        "\nMemory store now holds {} record(s) at {}",
        processor.store().len(),
        processor.store().path().display(),
    );

    Ok(())
}
