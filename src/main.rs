use std::env;

use jobscout::crawlers::{build_reqwest_client, build_sources};
use jobscout::models::config::AppConfig;
use jobscout::processing::embedding::{EmbeddingGenerator, FastEmbedGenerator};
use jobscout::processing::enrich::DescriptionEnricher;
use jobscout::processing::matcher::{MatchingOrchestrator, process_match_message};
use jobscout::processing::{ZMQMessage, ZMQResponse};
use jobscout::repository::VectorIndex;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config_path = env::var("JOBSCOUT_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
    let config = match AppConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Failed to load configuration from {config_path}: {e}");
            std::process::exit(1);
        }
    };

    let embedder = match FastEmbedGenerator::new(
        &config.embedding_model,
        config.embedding_cache_dir.clone(),
        config.embedding_batch_size,
    ) {
        Ok(embedder) => embedder,
        Err(e) => {
            log::error!("Failed to initialize embedder: {e}");
            std::process::exit(1);
        }
    };

    let index = match VectorIndex::open(&config.index_dir, embedder.dimensions()) {
        Ok(index) => index,
        Err(e) => {
            log::error!(
                "Refusing to serve from index at {}: {e}",
                config.index_dir.display()
            );
            std::process::exit(1);
        }
    };

    let client = match build_reqwest_client(config.fetch_timeout()) {
        Ok(client) => client,
        Err(e) => {
            log::error!("Failed to build HTTP client: {e}");
            std::process::exit(1);
        }
    };

    let orchestrator = MatchingOrchestrator::new(build_sources(&client), embedder, index)
        .with_fetch_timeout(config.fetch_timeout())
        .with_enricher(DescriptionEnricher::new(client, config.enrich_concurrency));

    let context = zmq::Context::new();
    let responder = context.socket(zmq::REP).expect("Cannot create zmq socket");
    responder
        .bind(&config.zmq_address)
        .expect("Cannot bind to zmq port");
    log::info!("Listening for match requests on {}", config.zmq_address);

    loop {
        let msg = match responder.recv_bytes(0) {
            Ok(msg) => msg,
            Err(e) => {
                log::error!("Failed to receive message: {e}");
                continue;
            }
        };

        let response = match serde_json::from_slice::<ZMQMessage>(&msg) {
            Ok(parsed) => process_match_message(parsed, &orchestrator).await,
            Err(e) => {
                log::error!("Failed to parse JSON: {e}");
                ZMQResponse::Error {
                    reason: format!("invalid message: {e}"),
                }
            }
        };

        let payload = match serde_json::to_vec(&response) {
            Ok(payload) => payload,
            Err(e) => {
                log::error!("Failed to serialize response: {e}");
                br#"{"Error":{"reason":"failed to serialize response"}}"#.to_vec()
            }
        };
        if let Err(e) = responder.send(payload, 0) {
            log::error!("Failed to send response: {e}");
        }
    }
}
