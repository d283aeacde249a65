//! CogLoom Daemon - Headless 认知主循环
//!
//! 演示部署：三个任务队列隔离区 + 后台投递器，Ctrl+C 退出。
//! 引擎自持运行时，main 保持同步并在 run() 上阻塞。

use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cg_core::CogLoomConfig;
use cg_engine::CognitiveSynergyEngine;
use cg_host::{HostTask, TaskQueueHost};

fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cogloom_daemon=info,cg_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("CogLoom Daemon starting...");

    let config = CogLoomConfig::default();
    let mut engine = CognitiveSynergyEngine::with_task_queue_hosts(config);
    engine
        .initialize()
        .map_err(|e| anyhow::anyhow!("engine initialize failed: {e}"))?;
    tracing::info!("Engine initialized");

    let io = engine
        .io_handle()
        .ok_or_else(|| anyhow::anyhow!("io runtime missing after initialize"))?;

    // 传感隔离区：后台投递器持续喂入工作
    let (sensor_tx, sensor_rx) = flume::unbounded();
    engine
        .create_isolate_with_host("sensor", Box::new(TaskQueueHost::with_intake(sensor_rx)))
        .map_err(|e| anyhow::anyhow!("create sensor isolate failed: {e}"))?;
    io.spawn(async move {
        let mut seq = 0u64;
        loop {
            seq += 1;
            let n = seq;
            if sensor_tx
                .send(HostTask::leaf(move || {
                    tracing::trace!(n, "sensor sample processed");
                }))
                .is_err()
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    });
    tracing::info!("Sensor isolate registered with background feeder");

    // 推理隔离区：预载一批带续延的工作
    let mut reasoner = TaskQueueHost::new();
    for step in 0..64u32 {
        reasoner.push_task(HostTask::new(move || {
            Some(HostTask::leaf(move || {
                tracing::trace!(step, "reasoner continuation settled");
            }))
        }));
    }
    engine
        .create_isolate_with_host("reasoner", Box::new(reasoner))
        .map_err(|e| anyhow::anyhow!("create reasoner isolate failed: {e}"))?;
    tracing::info!("Reasoner isolate registered");

    // 归档隔离区：模拟内存密集宿主，观察压力再加权
    let mut archivist = TaskQueueHost::new();
    archivist.set_base_memory(60 * 1024 * 1024);
    engine
        .create_isolate_with_host("archivist", Box::new(archivist))
        .map_err(|e| anyhow::anyhow!("create archivist isolate failed: {e}"))?;
    tracing::info!("Archivist isolate registered");

    tracing::info!(
        isolates = engine.isolate_count(),
        "CogLoom Daemon is ready, press Ctrl+C to shutdown"
    );

    // Ctrl+C 经句柄请求停机，控制环在迭代边界退出
    let handle = engine.handle();
    io.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl+C received, stopping engine");
            handle.stop();
        }
    });

    let exit = engine
        .run()
        .map_err(|e| anyhow::anyhow!("engine run failed: {e}"))?;

    let metrics = engine.metrics();
    tracing::info!(
        exit,
        iterations = metrics.iterations,
        slices = metrics.slices,
        ticks = metrics.ticks,
        "Shutting down"
    );

    Ok(())
}
