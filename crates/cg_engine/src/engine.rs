//! 认知协同引擎
//!
//! 控制环每次迭代按固定相序推进：prepare (选中隔离区并执行时间片)
//! → 阻塞等待 → check (结算检查点) → 认知 tick (按独立间隔衰减 +
//! 压力再加权) → idle (有界维护)。相与相之间永不交错。

use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Interval, MissedTickBehavior};

use cg_core::{CogLoomConfig, CogLoomError, Result};
use cg_host::{HostContext, HostFactory, IsolateContext, IsolateSnapshot, TaskQueueFactory};
use cg_sched::CognitiveScheduler;

use crate::command::{EngineCommand, EngineHandle, EngineSignals};
use crate::metrics::{EngineMetrics, MetricsSnapshot};

/// 每次迭代 idle 相最多处理的维护任务数
const IDLE_BUDGET_PER_ITERATION: usize = 4;

/// 每隔多少个认知 tick 排一次指标输出
const METRICS_FLUSH_INTERVAL_TICKS: u64 = 200;

/// 引擎生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Initialized,
    Running,
    Stopped,
}

/// idle 相的低优先级维护任务 (扩展点)
enum Maintenance {
    /// 输出一次控制环指标
    FlushMetrics,
}

/// 认知协同引擎
pub struct CognitiveSynergyEngine {
    config: CogLoomConfig,
    state: EngineState,
    scheduler: CognitiveScheduler,
    factory: Box<dyn HostFactory>,
    commands: flume::Receiver<EngineCommand>,
    handle: EngineHandle,
    signals: Arc<EngineSignals>,
    /// 控制环运行时，initialize 时创建
    loop_rt: Option<tokio::runtime::Runtime>,
    /// 后台 I/O 运行时，调度逻辑不使用
    io_rt: Option<tokio::runtime::Runtime>,
    /// 本迭代选中的隔离区，prepare → check 窗口内有效
    current: Option<String>,
    maintenance: VecDeque<Maintenance>,
    idle_armed: bool,
    metrics: EngineMetrics,
    tick_serial: u64,
}

impl CognitiveSynergyEngine {
    /// 创建引擎，宿主分配交给指定工厂
    pub fn new(config: CogLoomConfig, factory: Box<dyn HostFactory>) -> Self {
        let (command_tx, command_rx) = flume::unbounded();
        let signals = EngineSignals::new();
        let handle = EngineHandle::new(command_tx, signals.clone());
        let scheduler = CognitiveScheduler::new(&config);
        let metrics = EngineMetrics::new(config.enable_monitoring);

        Self {
            config,
            state: EngineState::Uninitialized,
            scheduler,
            factory,
            commands: command_rx,
            handle,
            signals,
            loop_rt: None,
            io_rt: None,
            current: None,
            maintenance: VecDeque::new(),
            idle_armed: false,
            metrics,
            tick_serial: 0,
        }
    }

    /// 创建以任务队列宿主为后端的引擎
    pub fn with_task_queue_hosts(config: CogLoomConfig) -> Self {
        Self::new(config, Box::new(TaskQueueFactory))
    }

    /// 搭建控制环与后台 I/O 运行时，幂等
    ///
    /// 运行时创建失败是唯一的致命启动错误，直接上抛给调用方。
    pub fn initialize(&mut self) -> Result<()> {
        if self.state != EngineState::Uninitialized {
            return Ok(());
        }

        let loop_rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;
        let io_rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.worker_threads.max(1))
            .thread_name("cogloom-io")
            .enable_all()
            .build()?;

        self.loop_rt = Some(loop_rt);
        self.io_rt = Some(io_rt);
        self.state = EngineState::Initialized;
        tracing::info!(
            tick_ms = self.config.cognitive_tick_ms,
            worker_threads = self.config.worker_threads,
            attention = self.config.attention_based_scheduling,
            "engine initialized"
        );
        Ok(())
    }

    /// 运行控制环，阻塞当前线程直到 stop
    pub fn run(&mut self) -> Result<i32> {
        if self.state == EngineState::Uninitialized {
            return Err(CogLoomError::NotInitialized);
        }
        let rt = self.loop_rt.take().ok_or(CogLoomError::NotInitialized)?;

        self.state = EngineState::Running;
        self.signals.stop.store(false, Ordering::SeqCst);
        self.signals.running.store(true, Ordering::SeqCst);
        tracing::info!("cognitive loop running");

        rt.block_on(self.run_loop());

        self.signals.running.store(false, Ordering::SeqCst);
        self.loop_rt = Some(rt);
        self.state = EngineState::Stopped;
        tracing::info!("cognitive loop stopped");
        Ok(0)
    }

    /// 请求控制环在下一个安全点退出，可从任意线程经句柄调用
    pub fn stop(&self) {
        self.signals.stop.store(true, Ordering::SeqCst);
        self.signals.wake.notify_one();
    }

    /// 获取可跨线程克隆的引擎句柄
    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    /// 后台 I/O 运行时句柄，供宿主内部异步工作使用
    pub fn io_handle(&self) -> Option<tokio::runtime::Handle> {
        self.io_rt.as_ref().map(|rt| rt.handle().clone())
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    // ------------------------------------------------------------------
    // 隔离区生命周期
    // ------------------------------------------------------------------

    /// 创建隔离区：分配宿主 → 包装上下文 → 注册调度
    ///
    /// id 重复或宿主分配失败时返回错误，引擎本身继续运行。
    pub fn create_isolate(&mut self, id: &str) -> Result<()> {
        if self.state == EngineState::Uninitialized {
            return Err(CogLoomError::NotInitialized);
        }
        if self.scheduler.contains(id) {
            return Err(CogLoomError::DuplicateId(id.to_string()));
        }
        let host = self.factory.allocate(id)?;
        self.register_context(IsolateContext::new(id, host))
    }

    /// 用调用方预构建的宿主创建隔离区
    pub fn create_isolate_with_host(&mut self, id: &str, host: Box<dyn HostContext>) -> Result<()> {
        if self.state == EngineState::Uninitialized {
            return Err(CogLoomError::NotInitialized);
        }
        if self.scheduler.contains(id) {
            return Err(CogLoomError::DuplicateId(id.to_string()));
        }
        self.register_context(IsolateContext::new(id, host))
    }

    fn register_context(&mut self, context: IsolateContext) -> Result<()> {
        let id = context.id().to_string();
        self.scheduler.register(context)?;
        tracing::info!(id = %id, "isolate created");
        Ok(())
    }

    /// 销毁隔离区；未知 id 静默无操作
    pub fn destroy_isolate(&mut self, id: &str) {
        if self.current.as_deref() == Some(id) {
            self.current = None;
        }
        // 先从调度候选集注销，之后才释放宿主资源
        if let Some(context) = self.scheduler.unregister(id) {
            drop(context);
            tracing::info!(id, "isolate destroyed");
        }
    }

    pub fn get_isolate(&self, id: &str) -> Option<&IsolateContext> {
        self.scheduler.get(id)
    }

    pub fn isolate_count(&self) -> usize {
        self.scheduler.isolate_count()
    }

    // ------------------------------------------------------------------
    // 注意力访问器与自省
    // ------------------------------------------------------------------

    /// 未知 id 返回 0.0，查询面保持全定义
    pub fn get_sti(&self, id: &str) -> f64 {
        self.scheduler
            .get(id)
            .map(|c| c.attention().sti())
            .unwrap_or(0.0)
    }

    pub fn set_sti(&mut self, id: &str, value: f64) -> Result<()> {
        match self.scheduler.get_mut(id) {
            Some(context) => {
                context.attention_mut().set_sti(value);
                Ok(())
            }
            None => Err(CogLoomError::UnknownId(id.to_string())),
        }
    }

    /// 未知 id 返回 0.0
    pub fn get_lti(&self, id: &str) -> f64 {
        self.scheduler
            .get(id)
            .map(|c| c.attention().lti())
            .unwrap_or(0.0)
    }

    pub fn set_lti(&mut self, id: &str, value: f64) -> Result<()> {
        match self.scheduler.get_mut(id) {
            Some(context) => {
                context.attention_mut().set_lti(value);
                Ok(())
            }
            None => Err(CogLoomError::UnknownId(id.to_string())),
        }
    }

    /// 未知 id 返回 0
    pub fn memory_usage(&self, id: &str) -> u64 {
        self.scheduler
            .get(id)
            .map(|c| c.memory_usage())
            .unwrap_or(0)
    }

    pub fn snapshots(&self) -> Vec<IsolateSnapshot> {
        self.scheduler.snapshots()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    // ------------------------------------------------------------------
    // 控制环
    // ------------------------------------------------------------------

    async fn run_loop(&mut self) {
        let period = Duration::from_millis(self.config.cognitive_tick_ms.max(1));
        let mut tick = tokio::time::interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.metrics.mark_started();

        while !self.signals.stop.load(Ordering::SeqCst) {
            self.on_prepare();
            let tick_due = Self::io_wait(&self.signals, self.has_pending_work(), &mut tick).await;
            self.on_check();
            if tick_due {
                self.on_cognitive_tick();
            }
            self.on_idle();
            self.metrics.record_iteration();
        }
    }

    /// prepare 与 check 之间的阻塞等待；返回认知 tick 是否到期
    async fn io_wait(signals: &EngineSignals, has_work: bool, tick: &mut Interval) -> bool {
        if has_work {
            // 还有待处理工作时只做非阻塞 tick 探测
            tokio::select! {
                biased;
                _ = tick.tick() => true,
                _ = std::future::ready(()) => false,
            }
        } else {
            tokio::select! {
                biased;
                _ = tick.tick() => true,
                _ = signals.wake.notified() => false,
            }
        }
    }

    /// idle 相活跃或有未封送指令时控制环不得阻塞
    fn has_pending_work(&self) -> bool {
        self.idle_armed || !self.commands.is_empty()
    }

    /// prepare 相：封送指令落地，选中隔离区并执行时间片
    fn on_prepare(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            self.apply_command(command);
        }

        self.current = self.scheduler.select_next();
        if let Some(id) = self.current.clone() {
            let max_units = self.config.max_microtasks_per_slice;
            if let Some(context) = self.scheduler.get_mut(&id) {
                match context.run_slice(max_units) {
                    Ok(()) => self.metrics.record_slice(),
                    Err(e) => {
                        // 单个隔离区失败不拖垮控制环，本迭代剩余阶段跳过它
                        tracing::warn!(id = %id, error = %e, "run_slice failed");
                        self.metrics.record_slice_failure();
                        self.current = None;
                    }
                }
            }
        }
    }

    /// check 相：对本迭代执行过时间片的隔离区结算检查点
    fn on_check(&mut self) {
        let Some(id) = self.current.take() else {
            return;
        };
        if let Some(context) = self.scheduler.get_mut(&id) {
            if let Err(e) = context.checkpoint() {
                tracing::warn!(id = %id, error = %e, "checkpoint failed");
                self.metrics.record_slice_failure();
            }
        }
    }

    /// 认知 tick：衰减在前，压力再加权在后
    fn on_cognitive_tick(&mut self) {
        self.scheduler.decay_attention();
        self.scheduler.update_attention();
        self.metrics.record_tick();
        self.tick_serial += 1;

        if self.config.enable_monitoring && self.tick_serial % METRICS_FLUSH_INTERVAL_TICKS == 0 {
            self.maintenance.push_back(Maintenance::FlushMetrics);
            self.idle_armed = true;
        }
    }

    /// idle 相：有界消化维护队列，清空后自禁用
    fn on_idle(&mut self) {
        if !self.idle_armed {
            return;
        }
        for _ in 0..IDLE_BUDGET_PER_ITERATION {
            let Some(job) = self.maintenance.pop_front() else {
                break;
            };
            match job {
                Maintenance::FlushMetrics => {
                    let snap = self.metrics.snapshot();
                    tracing::debug!(
                        iterations = snap.iterations,
                        slices = snap.slices,
                        ticks = snap.ticks,
                        slice_failures = snap.slice_failures,
                        "cognitive loop metrics"
                    );
                }
            }
            self.metrics.record_maintenance();
        }
        if self.maintenance.is_empty() {
            self.idle_armed = false;
        }
    }

    fn apply_command(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::CreateIsolate { id, reply } => {
                let _ = reply.send(self.create_isolate(&id));
            }
            EngineCommand::DestroyIsolate { id, reply } => {
                self.destroy_isolate(&id);
                let _ = reply.send(());
            }
            EngineCommand::SetSti { id, value, reply } => {
                let _ = reply.send(self.set_sti(&id, value));
            }
            EngineCommand::SetLti { id, value, reply } => {
                let _ = reply.send(self.set_lti(&id, value));
            }
            EngineCommand::GetSti { id, reply } => {
                let _ = reply.send(self.get_sti(&id));
            }
            EngineCommand::GetLti { id, reply } => {
                let _ = reply.send(self.get_lti(&id));
            }
            EngineCommand::GetMemoryUsage { id, reply } => {
                let _ = reply.send(self.memory_usage(&id));
            }
            EngineCommand::IsolateCount { reply } => {
                let _ = reply.send(self.scheduler.isolate_count());
            }
            EngineCommand::Snapshots { reply } => {
                let _ = reply.send(self.scheduler.snapshots());
            }
            EngineCommand::Metrics { reply } => {
                let _ = reply.send(self.metrics.snapshot());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cg_host::{HostTask, TaskQueueHost};
    use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
    use std::thread;

    fn fast_config() -> CogLoomConfig {
        CogLoomConfig {
            cognitive_tick_ms: 1,
            ..CogLoomConfig::default()
        }
    }

    struct FailingFactory;

    impl HostFactory for FailingFactory {
        fn allocate(&self, id: &str) -> Result<Box<dyn HostContext>> {
            Err(CogLoomError::HostAllocation(format!(
                "no host backend for {id}"
            )))
        }
    }

    #[test]
    fn test_run_before_initialize_fails() {
        let mut engine = CognitiveSynergyEngine::with_task_queue_hosts(fast_config());
        assert!(matches!(engine.run(), Err(CogLoomError::NotInitialized)));
        assert_eq!(engine.state(), EngineState::Uninitialized);
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let mut engine = CognitiveSynergyEngine::with_task_queue_hosts(fast_config());
        engine.initialize().expect("first initialize");
        engine.initialize().expect("second initialize is a no-op");
        assert_eq!(engine.state(), EngineState::Initialized);
    }

    #[test]
    fn test_create_before_initialize_fails() {
        let mut engine = CognitiveSynergyEngine::with_task_queue_hosts(fast_config());
        assert!(matches!(
            engine.create_isolate("alpha"),
            Err(CogLoomError::NotInitialized)
        ));
    }

    #[test]
    fn test_create_duplicate_isolate_fails() {
        let mut engine = CognitiveSynergyEngine::with_task_queue_hosts(fast_config());
        engine.initialize().expect("initialize");
        engine.create_isolate("alpha").expect("first create");
        let err = engine.create_isolate("alpha").unwrap_err();
        assert!(matches!(err, CogLoomError::DuplicateId(_)));
        assert_eq!(engine.isolate_count(), 1);
    }

    #[test]
    fn test_failed_allocation_creates_nothing() {
        let mut engine =
            CognitiveSynergyEngine::new(fast_config(), Box::new(FailingFactory));
        engine.initialize().expect("initialize");
        let err = engine.create_isolate("alpha").unwrap_err();
        assert!(matches!(err, CogLoomError::HostAllocation(_)));
        assert_eq!(engine.isolate_count(), 0);
    }

    #[test]
    fn test_destroy_unknown_is_noop() {
        let mut engine = CognitiveSynergyEngine::with_task_queue_hosts(fast_config());
        engine.initialize().expect("initialize");
        engine.create_isolate("alpha").expect("create");
        engine.destroy_isolate("missing");
        assert_eq!(engine.isolate_count(), 1);
    }

    #[test]
    fn test_accessors_are_total_for_unknown_ids() {
        let mut engine = CognitiveSynergyEngine::with_task_queue_hosts(fast_config());
        assert_eq!(engine.get_sti("missing"), 0.0);
        assert_eq!(engine.get_lti("missing"), 0.0);
        assert_eq!(engine.memory_usage("missing"), 0);
        assert!(matches!(
            engine.set_sti("missing", 10.0),
            Err(CogLoomError::UnknownId(_))
        ));
    }

    #[test]
    fn test_stop_from_another_thread() {
        let mut engine = CognitiveSynergyEngine::with_task_queue_hosts(fast_config());
        engine.initialize().expect("initialize");
        engine.create_isolate("alpha").expect("create");
        let handle = engine.handle();

        let worker = thread::spawn(move || engine.run());
        thread::sleep(Duration::from_millis(50));
        assert!(handle.is_running());

        handle.stop();
        let exit = worker.join().expect("loop thread").expect("run result");
        assert_eq!(exit, 0);
        assert!(!handle.is_running());
    }

    #[test]
    fn test_marshaled_lifecycle_commands() {
        let mut engine = CognitiveSynergyEngine::with_task_queue_hosts(fast_config());
        engine.initialize().expect("initialize");
        let handle = engine.handle();

        let worker = thread::spawn(move || engine.run());

        handle.create_isolate("alpha").expect("create via handle");
        let err = handle.create_isolate("alpha").unwrap_err();
        assert!(matches!(err, CogLoomError::DuplicateId(_)));
        assert_eq!(handle.isolate_count().expect("count"), 1);

        handle.set_sti("alpha", 90.0).expect("set sti");
        assert_eq!(handle.get_sti("alpha").expect("get sti"), 90.0);
        assert_eq!(handle.get_sti("missing").expect("get sti"), 0.0);

        handle.destroy_isolate("alpha").expect("destroy");
        handle.destroy_isolate("alpha").expect("idempotent destroy");
        assert_eq!(handle.isolate_count().expect("count"), 0);

        handle.stop();
        worker.join().expect("loop thread").expect("run result");
    }

    #[test]
    fn test_slices_and_checkpoints_run() {
        let mut engine = CognitiveSynergyEngine::with_task_queue_hosts(fast_config());
        engine.initialize().expect("initialize");

        let sliced = Arc::new(AtomicU32::new(0));
        let settled = Arc::new(AtomicU32::new(0));

        let mut host = TaskQueueHost::new();
        let s1 = sliced.clone();
        let s2 = settled.clone();
        // 时间片内执行主体，续延必须等到检查点
        host.push_task(HostTask::new(move || {
            s1.fetch_add(1, AtomicOrdering::SeqCst);
            Some(HostTask::leaf(move || {
                s2.fetch_add(1, AtomicOrdering::SeqCst);
            }))
        }));
        engine
            .create_isolate_with_host("worker", Box::new(host))
            .expect("create with host");

        let handle = engine.handle();
        let worker = thread::spawn(move || engine.run());
        thread::sleep(Duration::from_millis(100));
        handle.stop();
        worker.join().expect("loop thread").expect("run result");

        assert_eq!(sliced.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(settled.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn test_attention_decays_while_running() {
        let mut engine = CognitiveSynergyEngine::with_task_queue_hosts(fast_config());
        engine.initialize().expect("initialize");
        engine.create_isolate("alpha").expect("create");
        let handle = engine.handle();

        let worker = thread::spawn(move || engine.run());
        thread::sleep(Duration::from_millis(150));

        let sti = handle.get_sti("alpha").expect("get sti");
        assert!(sti < 50.0, "sti should have decayed, got {sti}");
        assert!(sti >= 1.0, "sti must stay at or above the floor, got {sti}");

        handle.stop();
        worker.join().expect("loop thread").expect("run result");
    }

    #[test]
    fn test_broken_host_does_not_halt_loop() {
        struct BrokenHost;
        impl HostContext for BrokenHost {
            fn run_slice(&mut self, _max_units: u32) -> Result<()> {
                Err(CogLoomError::Host("slice exploded".to_string()))
            }
            fn checkpoint(&mut self) -> Result<()> {
                Ok(())
            }
            fn memory_usage(&self) -> u64 {
                0
            }
            fn cpu_time(&self) -> f64 {
                0.0
            }
        }

        let mut engine = CognitiveSynergyEngine::with_task_queue_hosts(fast_config());
        engine.initialize().expect("initialize");
        engine
            .create_isolate_with_host("broken", Box::new(BrokenHost))
            .expect("create broken");
        let handle = engine.handle();

        let worker = thread::spawn(move || engine.run());
        thread::sleep(Duration::from_millis(50));

        // 损坏的隔离区不拖垮控制环，句柄仍可用
        assert!(handle.is_running());
        assert_eq!(handle.isolate_count().expect("count"), 1);
        let metrics = handle.metrics().expect("metrics");
        assert!(metrics.slice_failures > 0);

        handle.stop();
        worker.join().expect("loop thread").expect("run result");
    }

    #[test]
    fn test_rerun_after_stop() {
        let mut engine = CognitiveSynergyEngine::with_task_queue_hosts(fast_config());
        engine.initialize().expect("initialize");
        let handle = engine.handle();

        let worker = thread::spawn(move || {
            let first = engine.run();
            (engine, first)
        });
        thread::sleep(Duration::from_millis(30));
        handle.stop();
        let (mut engine, first) = worker.join().expect("loop thread");
        assert_eq!(first.expect("first run"), 0);
        assert_eq!(engine.state(), EngineState::Stopped);

        let handle = engine.handle();
        let worker = thread::spawn(move || engine.run());
        thread::sleep(Duration::from_millis(30));
        assert!(handle.is_running());
        handle.stop();
        worker.join().expect("loop thread").expect("second run");
    }
}
