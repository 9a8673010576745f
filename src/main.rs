use anyhow::Result;
use futures_lite::stream::StreamExt;
use lapin::{
    message::Delivery, options::*, types::FieldTable, Channel, Connection, ConnectionProperties,
    Consumer,
};
use log::{error, info, warn};
use loadmaster_stress::worker::{parse_control_message, parse_test_message, Publisher, Worker};
use loadmaster_stress::{HttpQueryService, StressTestRunner, SystemMetricsSource, WorkerConfig};
use std::sync::Arc;

async fn declare_queue(channel: &Channel, queue: &str) -> Result<()> {
    channel
        .queue_declare(
            queue,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;
    Ok(())
}

async fn consume(channel: &Channel, queue: &str, tag: &str) -> Result<Consumer> {
    Ok(channel
        .basic_consume(
            queue,
            tag,
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?)
}

async fn ack(delivery: &Delivery) {
    if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
        error!("❌ Failed to ack: {}", e);
    }
}

async fn reject(delivery: &Delivery) {
    let options = BasicNackOptions {
        requeue: false,
        ..Default::default()
    };
    if let Err(e) = delivery.nack(options).await {
        error!("❌ Failed to nack: {}", e);
    }
}

async fn handle_control(worker: Worker, mut consumer: Consumer) {
    while let Some(delivery) = consumer.next().await {
        let delivery = match delivery {
            Ok(delivery) => delivery,
            Err(e) => {
                error!("❌ Control consumer error: {}", e);
                continue;
            }
        };

        match parse_control_message(&delivery.data) {
            Ok(message) => {
                worker.control(message).await;
                ack(&delivery).await;
            }
            Err(e) => {
                error!("❌ Failed to parse control message: {}", e);
                reject(&delivery).await;
            }
        }
    }
    warn!("⚠️ Control consumer closed");
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let config = WorkerConfig::from_env();

    info!("🚀 Stress test worker starting...");
    info!("📡 Connecting to RabbitMQ at {}", config.rabbitmq_url);

    let conn = Connection::connect(&config.rabbitmq_url, ConnectionProperties::default()).await?;
    let channel = conn.create_channel().await?;

    info!("✅ Connected to RabbitMQ successfully");

    for queue in config.queues.all() {
        declare_queue(&channel, queue).await?;
    }

    let metrics = Arc::new(SystemMetricsSource::detect().await);
    info!("📊 Telemetry ready (GPU backend: {})", metrics.gpu_backend());

    let service = Arc::new(HttpQueryService::new(
        &config.service_base_url,
        &config.service_query_path,
    )?);
    info!("🎯 Target service: {}", service.endpoint());

    let runner = StressTestRunner::new(service, metrics);
    let worker = Worker::new(runner, Publisher::new(channel.clone()), &config);

    let control = consume(&channel, &config.queues.control, "stress_control").await?;
    tokio::spawn(handle_control(worker.clone(), control));

    let mut consumer = consume(&channel, &config.queues.tests, "stress_worker").await?;
    info!("🎧 Waiting for stress test messages...");

    while let Some(delivery) = consumer.next().await {
        let delivery = match delivery {
            Ok(delivery) => delivery,
            Err(e) => {
                error!("❌ Consumer error: {}", e);
                continue;
            }
        };

        info!("📨 Received message: {}", String::from_utf8_lossy(&delivery.data));

        let message = match parse_test_message(&delivery.data) {
            Ok(message) => message,
            Err(e) => {
                error!("❌ Failed to parse message: {}", e);
                reject(&delivery).await;
                continue;
            }
        };

        let test_id = message.test_id.clone();
        match worker.launch(message).await {
            Ok(_) => ack(&delivery).await,
            Err(e) => {
                error!("❌ Invalid configuration for {}: {}", test_id, e);
                reject(&delivery).await;
            }
        }
    }

    Ok(())
}
