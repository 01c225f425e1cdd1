//! Block execution engine implementation

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use futures::FutureExt;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::domain::block::{
    BlockChain, BlockChainExecutionResult, BlockError, BlockExecutionContext,
    BlockExecutionResult, BlockInstance, BlockOutputs, BlockOutputsMap, BlockRegistry,
    ChainOutputs, ExecutionContext,
};
use crate::domain::chain::{ChainExecutor, ExecutionPlan, PlannedBlock};
use crate::domain::template::resolve_inputs;
use crate::infrastructure::observability::{
    record_block_execution, record_block_timeout, record_chain_execution,
};

/// Orchestrates chain runs against a block registry
#[derive(Debug, Clone)]
pub struct BlockExecutionEngine {
    registry: BlockRegistry,
}

impl BlockExecutionEngine {
    pub fn new(registry: BlockRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    /// Execute a single block. Every failure, including an unregistered type
    /// or an elapsed deadline, comes back as a failed result.
    pub async fn execute_block(
        &self,
        block: &BlockInstance,
        context: BlockExecutionContext,
    ) -> BlockExecutionResult {
        let started = Instant::now();

        match self.invoke_handler(block, context).await {
            Ok(outputs) => {
                let elapsed = started.elapsed();
                record_block_execution(&block.block_type, true, elapsed);

                debug!(
                    block_id = %block.id,
                    block_type = %block.block_type,
                    duration_ms = elapsed.as_millis() as u64,
                    "Block completed"
                );

                BlockExecutionResult::success(block, outputs, elapsed.as_millis() as u64)
            }
            Err(e) => {
                record_block_execution(&block.block_type, false, started.elapsed());

                if matches!(e, BlockError::BlockTimeout { .. }) {
                    record_block_timeout(&block.block_type);
                }

                warn!(
                    block_id = %block.id,
                    block_type = %block.block_type,
                    error = %e,
                    "Block failed"
                );

                BlockExecutionResult::failure(block, &e)
            }
        }
    }

    /// Look up the handler and run it on its own task.
    ///
    /// The block's timeout wins over the definition's default; with neither
    /// the call has no deadline. On timeout the task is detached, not
    /// aborted: the handler keeps running and its result is discarded.
    async fn invoke_handler(
        &self,
        block: &BlockInstance,
        context: BlockExecutionContext,
    ) -> Result<BlockOutputs, BlockError> {
        let (definition, handler) = self
            .registry
            .get(&block.block_type)
            .ok_or_else(|| BlockError::unregistered(&block.block_type))?;

        let timeout_ms = block.timeout.or(definition.timeout);
        let config = block.config.clone();

        let task = tokio::spawn(async move { handler.execute(context, config).await });

        let joined = match timeout_ms {
            Some(ms) => tokio::time::timeout(Duration::from_millis(ms), task)
                .await
                .map_err(|_| BlockError::block_timeout(&block.id, ms))?,
            None => task.await,
        };

        joined.map_err(|e| {
            BlockError::internal(format!("Handler task for block '{}' failed: {}", block.id, e))
        })?
    }

    /// Sequential blocks first, then the parallel batches
    async fn run(&self, run: &mut ChainRun<'_>, plan: &ExecutionPlan<'_>) -> Result<(), BlockError> {
        for planned in &plan.sequential {
            let context = run.context_for(*planned);
            let result = self.execute_block(planned.block, context).await;

            let halt = run.apply_failure_policy(planned.block, &result);
            run.record(planned.block, result);
            run.check_timeout()?;

            if halt {
                debug!(block_id = %planned.block.id, "Fail-fast triggered, stopping chain");
                return Ok(());
            }
        }

        for batch in &plan.parallel_batches {
            // Every member resolves against the same snapshot
            let contexts: Vec<BlockExecutionContext> =
                batch.iter().map(|planned| run.context_for(*planned)).collect();

            debug!(size = batch.len(), "Executing parallel batch");

            let results = join_all(
                batch
                    .iter()
                    .zip(contexts)
                    .map(|(planned, context)| self.execute_block(planned.block, context)),
            )
            .await;

            let mut halt = false;

            for (planned, result) in batch.iter().zip(results) {
                if !halt {
                    halt = run.apply_failure_policy(planned.block, &result);
                }
                run.record(planned.block, result);
            }

            run.check_timeout()?;

            if halt {
                debug!("Fail-fast triggered in parallel batch, stopping chain");
                return Ok(());
            }
        }

        Ok(())
    }

    async fn run_chain(&self, chain: &BlockChain, context: &ExecutionContext) -> BlockChainExecutionResult {
        info!(blocks = chain.len(), "Executing block chain");

        let plan = ExecutionPlan::build(chain);
        let mut run = ChainRun::new(chain, context);

        let outcome = AssertUnwindSafe(self.run(&mut run, &plan))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(BlockError::internal("Chain orchestration panicked")));

        let result = run.finish(outcome);

        record_chain_execution(result.success, Duration::from_millis(result.total_duration));

        info!(
            success = result.success,
            executed = result.results.len(),
            total_duration_ms = result.total_duration,
            "Block chain finished"
        );

        result
    }
}

#[async_trait]
impl ChainExecutor for BlockExecutionEngine {
    async fn execute_chain(
        &self,
        chain: &BlockChain,
        context: &ExecutionContext,
    ) -> BlockChainExecutionResult {
        let span = info_span!("chain_run", chain_id = %chain.id, run_id = %Uuid::new_v4());
        self.run_chain(chain, context).instrument(span).await
    }
}

/// Mutable state owned by one chain run
struct ChainRun<'a> {
    chain: &'a BlockChain,
    ambient: Arc<ExecutionContext>,
    started: Instant,
    block_outputs: Arc<BlockOutputsMap>,
    results: Vec<BlockExecutionResult>,
    success: bool,
    error: Option<String>,
}

impl<'a> ChainRun<'a> {
    fn new(chain: &'a BlockChain, context: &ExecutionContext) -> Self {
        Self {
            chain,
            ambient: Arc::new(context.clone()),
            started: Instant::now(),
            block_outputs: Arc::new(BlockOutputsMap::new()),
            results: Vec::with_capacity(chain.len()),
            success: true,
            error: None,
        }
    }

    fn context_for(&self, planned: PlannedBlock<'_>) -> BlockExecutionContext {
        let inputs = resolve_inputs(&planned.block.inputs, &self.block_outputs, &self.ambient);

        BlockExecutionContext::new(
            inputs,
            Arc::clone(&self.ambient),
            Arc::clone(&self.block_outputs),
            &planned.block.id,
            &planned.block.block_type,
            &self.chain.id,
            planned.index,
            self.chain.len(),
        )
    }

    /// Publish a block's outputs, successful or fallback-derived
    fn record(&mut self, block: &BlockInstance, result: BlockExecutionResult) {
        Arc::make_mut(&mut self.block_outputs).insert(block.id.clone(), result.outputs.clone());
        self.results.push(result);
    }

    /// Any failure makes the run unsuccessful. Returns whether this failure
    /// halts the chain.
    fn apply_failure_policy(&mut self, block: &BlockInstance, result: &BlockExecutionResult) -> bool {
        if result.success {
            return false;
        }

        self.success = false;
        self.error = result.error.clone();

        self.chain.is_fail_fast() || block.forces_fail_fast()
    }

    fn check_timeout(&self) -> Result<(), BlockError> {
        match self.chain.timeout {
            Some(timeout_ms) if self.started.elapsed() > Duration::from_millis(timeout_ms) => {
                Err(BlockError::chain_timeout(&self.chain.id, timeout_ms))
            }
            _ => Ok(()),
        }
    }

    fn finish(self, outcome: Result<(), BlockError>) -> BlockChainExecutionResult {
        let total_duration = self.started.elapsed().as_millis() as u64;

        match outcome {
            Ok(()) => BlockChainExecutionResult {
                chain_id: self.chain.id.clone(),
                success: self.success,
                outputs: ChainOutputs::aggregate(self.chain, &self.block_outputs),
                results: self.results,
                error: self.error,
                total_duration,
                timestamp: Utc::now(),
            },
            Err(e) => {
                warn!(error = %e, "Block chain aborted");

                BlockChainExecutionResult {
                    chain_id: self.chain.id.clone(),
                    success: false,
                    results: self.results,
                    outputs: ChainOutputs::default(),
                    error: Some(e.to_string()),
                    total_duration,
                    timestamp: Utc::now(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::block::{
        BlockDefinition, BlockErrorHandler, BlockHandler, ErrorStrategy, MockBlockHandler,
        handler_fn,
    };
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Returns its resolved inputs plus the block id
    fn echo_handler() -> Arc<dyn BlockHandler> {
        handler_fn(|ctx, _| async move {
            let mut out = ctx.inputs.clone();
            out.insert("block".to_string(), json!(ctx.block_id));
            Ok(out)
        })
    }

    /// Sleeps for `config.sleepMs`, then reports its id
    fn sleep_handler() -> Arc<dyn BlockHandler> {
        handler_fn(|ctx, config| async move {
            let ms = config["sleepMs"].as_u64().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(ms)).await;

            let mut out = BlockOutputs::new();
            out.insert("block".to_string(), json!(ctx.block_id));
            Ok(out)
        })
    }

    fn failing_handler() -> Arc<dyn BlockHandler> {
        handler_fn(|ctx, _| async move {
            Err(BlockError::handler(format!("{} exploded", ctx.block_id)))
        })
    }

    fn pending_handler() -> Arc<dyn BlockHandler> {
        handler_fn(|_, _| async {
            std::future::pending::<Result<BlockOutputs, BlockError>>().await
        })
    }

    fn engine_with(handlers: Vec<(&str, Arc<dyn BlockHandler>)>) -> BlockExecutionEngine {
        let registry = BlockRegistry::new();
        for (block_type, handler) in handlers {
            registry.register(block_type, BlockDefinition::new(block_type), handler);
        }
        BlockExecutionEngine::new(registry)
    }

    fn default_engine() -> BlockExecutionEngine {
        engine_with(vec![
            ("echo", echo_handler()),
            ("sleep", sleep_handler()),
            ("fail", failing_handler()),
            ("pending", pending_handler()),
        ])
    }

    fn result_ids(result: &BlockChainExecutionResult) -> Vec<String> {
        result.results.iter().map(|r| r.block_id.clone()).collect()
    }

    #[tokio::test]
    async fn test_empty_chain() {
        let engine = default_engine();
        let chain = BlockChain::new("empty");

        let result = engine.execute_chain(&chain, &ExecutionContext::new()).await;

        assert!(result.success);
        assert!(result.results.is_empty());
        assert!(result.outputs.is_empty());
        assert!(result.error.is_none());
        assert_eq!(
            serde_json::to_value(&result.outputs).unwrap(),
            json!({"blocks": {}})
        );
    }

    #[tokio::test]
    async fn test_all_sequential_blocks_succeed() {
        let engine = default_engine();
        let chain = BlockChain::new("seq")
            .with_block(BlockInstance::new("c", "echo"))
            .with_block(BlockInstance::new("a", "echo"))
            .with_block(BlockInstance::new("b", "echo"));

        let result = engine.execute_chain(&chain, &ExecutionContext::new()).await;

        assert!(result.success);
        assert_eq!(result.chain_id, "seq");
        assert_eq!(result.results.len(), chain.len());
        assert_eq!(result_ids(&result), vec!["c", "a", "b"]);

        let ids: Vec<&String> = result.outputs.blocks.keys().collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
        assert!(result.results.iter().all(|r| r.success));
    }

    #[tokio::test]
    async fn test_outputs_flow_into_later_inputs() {
        let engine = engine_with(vec![
            (
                "const",
                handler_fn(|_, _| async {
                    let mut out = BlockOutputs::new();
                    out.insert("x".to_string(), json!(5));
                    Ok(out)
                }),
            ),
            ("echo", echo_handler()),
        ]);

        let chain = BlockChain::new("flow")
            .with_block(BlockInstance::new("a", "const"))
            .with_block(
                BlockInstance::new("b", "echo")
                    .with_input("v", json!("${blocks.a.x}"))
                    .with_input("name", json!("${params.name}"))
                    .with_input("missing", json!("${blocks.zzz.x}")),
            );
        let ctx = ExecutionContext::new().with_param("name", json!("Bob"));

        let result = engine.execute_chain(&chain, &ctx).await;

        let b = result.outputs.block("b").unwrap();
        assert_eq!(b["v"], json!(5));
        assert_eq!(b["name"], json!("Bob"));
        assert_eq!(b["missing"], Value::Null);
    }

    #[tokio::test]
    async fn test_database_scenario() {
        let engine = engine_with(vec![(
            "db",
            handler_fn(|_, _| async {
                let mut out = BlockOutputs::new();
                out.insert("rows".to_string(), json!([]));
                out.insert("success".to_string(), json!(true));
                Ok(out)
            }),
        )]);

        let chain: BlockChain = serde_json::from_value(json!({
            "id": "c1",
            "blocks": [
                {"id": "s1", "blockType": "db", "config": {"function": "select"}, "inputs": {}}
            ]
        }))
        .unwrap();

        let result = engine.execute_chain(&chain, &ExecutionContext::new()).await;

        assert!(result.success);
        assert_eq!(result.results[0].outputs["rows"], json!([]));
        assert_eq!(result.outputs.block("s1").unwrap()["success"], json!(true));
    }

    #[tokio::test]
    async fn test_error_handler_fail_halts_chain() {
        let engine = default_engine();
        let chain = BlockChain::new("halt")
            .with_block(BlockInstance::new("a", "echo"))
            .with_block(BlockInstance::new("b", "fail").with_error_handler(BlockErrorHandler::Fail))
            .with_block(BlockInstance::new("c", "echo"));

        let result = engine.execute_chain(&chain, &ExecutionContext::new()).await;

        assert!(!result.success);
        assert_eq!(result_ids(&result), vec!["a", "b"]);
        assert!(result.results.len() < chain.len());
        assert_eq!(result.error.as_deref(), Some("Block handler failed: b exploded"));
        assert!(result.outputs.block("c").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fail_fast_strategy_halts_chain() {
        let engine = default_engine();
        let chain = BlockChain::new("ff")
            .with_strategy(ErrorStrategy::FailFast)
            .with_block(BlockInstance::new("a", "fail"))
            .with_block(BlockInstance::new("b", "echo"))
            .with_block(BlockInstance::new("p", "echo").with_parallel(true));

        let result = engine.execute_chain(&chain, &ExecutionContext::new()).await;

        assert!(!result.success);
        assert_eq!(result_ids(&result), vec!["a"]);
        assert_eq!(result.outputs.blocks.len(), 3);
    }

    #[tokio::test]
    async fn test_continue_uses_fallback_and_runs_to_end() {
        let engine = default_engine();
        let chain = BlockChain::new("cont")
            .with_block(BlockInstance::new("a", "fail").with_fallback(json!([])))
            .with_block(BlockInstance::new("b", "fail"))
            .with_block(BlockInstance::new("c", "echo").with_input("prev", json!("${blocks.a.result}")));

        let result = engine.execute_chain(&chain, &ExecutionContext::new()).await;

        assert!(!result.success);
        assert_eq!(result.results.len(), 3);
        assert_eq!(
            Value::Object(result.outputs.block("a").unwrap().clone()),
            json!({"result": []})
        );
        assert!(result.outputs.block("b").unwrap().is_empty());
        assert_eq!(result.outputs.block("c").unwrap()["prev"], json!([]));

        // Latest failure wins when nothing halted the chain
        assert_eq!(result.error.as_deref(), Some("Block handler failed: b exploded"));

        let a = result.result("a").unwrap();
        assert!(!a.success);
        assert_eq!(a.duration, 0);
        assert!(result.result("c").unwrap().success);
    }

    #[tokio::test]
    async fn test_block_timeout() {
        let engine = default_engine();
        let chain = BlockChain::new("t")
            .with_block(BlockInstance::new("slow", "pending").with_timeout(100))
            .with_block(BlockInstance::new("after", "echo"));

        let started = Instant::now();
        let result = engine.execute_chain(&chain, &ExecutionContext::new()).await;
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(1000));
        assert!(!result.success);
        assert_eq!(
            result.result("slow").unwrap().error.as_deref(),
            Some("Block 'slow' timed out after 100ms")
        );
        assert!(result.result("after").unwrap().success);
    }

    #[tokio::test]
    async fn test_definition_timeout_and_override() {
        let registry = BlockRegistry::new();
        registry.register(
            "sleep",
            BlockDefinition::new("sleep").with_timeout(50),
            sleep_handler(),
        );
        let engine = BlockExecutionEngine::new(registry);

        let chain = BlockChain::new("t")
            .with_block(BlockInstance::new("uses-default", "sleep").with_config(json!({"sleepMs": 150})))
            .with_block(
                BlockInstance::new("overridden", "sleep")
                    .with_config(json!({"sleepMs": 100}))
                    .with_timeout(1000),
            );

        let result = engine.execute_chain(&chain, &ExecutionContext::new()).await;

        assert_eq!(
            result.result("uses-default").unwrap().error.as_deref(),
            Some("Block 'uses-default' timed out after 50ms")
        );
        assert!(result.result("overridden").unwrap().success);
    }

    #[tokio::test]
    async fn test_timed_out_handler_keeps_running() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();

        let engine = engine_with(vec![(
            "slow",
            handler_fn(move |_, _| {
                let flag = flag.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(60)).await;
                    flag.store(true, Ordering::SeqCst);
                    Ok(BlockOutputs::new())
                }
            }),
        )]);

        let chain = BlockChain::new("detach").with_block(BlockInstance::new("s", "slow").with_timeout(10));

        let result = engine.execute_chain(&chain, &ExecutionContext::new()).await;
        assert!(!result.success);
        assert!(!finished.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_chain_timeout_aborts_with_partial_results() {
        let engine = default_engine();
        let chain = BlockChain::new("slow-chain")
            .with_timeout(50)
            .with_block(BlockInstance::new("a", "sleep").with_config(json!({"sleepMs": 120})))
            .with_block(BlockInstance::new("b", "echo"));

        let result = engine.execute_chain(&chain, &ExecutionContext::new()).await;

        assert!(!result.success);
        assert_eq!(result_ids(&result), vec!["a"]);
        assert!(result.results[0].success);
        assert!(result.outputs.is_empty());
        assert_eq!(
            result.error.as_deref(),
            Some("Chain 'slow-chain' timed out after 50ms")
        );
    }

    #[tokio::test]
    async fn test_chain_timeout_checked_after_parallel_batch() {
        let engine = default_engine();
        let chain = BlockChain::new("pc")
            .with_timeout(50)
            .with_block(
                BlockInstance::new("p1", "sleep")
                    .with_parallel(true)
                    .with_config(json!({"sleepMs": 120})),
            )
            .with_block(BlockInstance::new("p2", "echo").with_parallel(true))
            .with_block(BlockInstance::new("s1", "echo"))
            .with_block(BlockInstance::new("p3", "echo").with_parallel(true));

        let result = engine.execute_chain(&chain, &ExecutionContext::new()).await;

        assert!(!result.success);
        assert_eq!(result_ids(&result), vec!["s1", "p1", "p2"]);
        assert!(result.error.unwrap().contains("timed out after 50ms"));
    }

    #[tokio::test]
    async fn test_unregistered_block_type() {
        let engine = default_engine();
        let chain = BlockChain::new("u")
            .with_block(BlockInstance::new("k", "kafka").with_fallback(json!("offline")))
            .with_block(BlockInstance::new("e", "echo"));

        let result = engine.execute_chain(&chain, &ExecutionContext::new()).await;

        assert!(!result.success);
        assert_eq!(result.results.len(), 2);

        let k = result.result("k").unwrap();
        assert!(!k.success);
        assert_eq!(k.error.as_deref(), Some("Block type not registered: kafka"));
        assert_eq!(k.outputs["result"], json!("offline"));
        assert!(result.result("e").unwrap().success);
    }

    #[tokio::test]
    async fn test_parallel_results_follow_member_order() {
        let engine = default_engine();
        let chain = BlockChain::new("par")
            .with_block(
                BlockInstance::new("slow", "sleep")
                    .with_parallel(true)
                    .with_config(json!({"sleepMs": 80})),
            )
            .with_block(
                BlockInstance::new("fast", "sleep")
                    .with_parallel(true)
                    .with_config(json!({"sleepMs": 0})),
            );

        let result = engine.execute_chain(&chain, &ExecutionContext::new()).await;

        assert!(result.success);
        assert_eq!(result_ids(&result), vec!["slow", "fast"]);
        assert_eq!(result.outputs.block("slow").unwrap()["block"], json!("slow"));
        assert_eq!(result.outputs.block("fast").unwrap()["block"], json!("fast"));
    }

    #[tokio::test]
    async fn test_parallel_blocks_run_concurrently() {
        let engine = default_engine();
        let chain = BlockChain::new("par")
            .with_block(
                BlockInstance::new("a", "sleep")
                    .with_parallel(true)
                    .with_config(json!({"sleepMs": 150})),
            )
            .with_block(
                BlockInstance::new("b", "sleep")
                    .with_parallel(true)
                    .with_config(json!({"sleepMs": 150})),
            );

        let started = Instant::now();
        let result = engine.execute_chain(&chain, &ExecutionContext::new()).await;

        assert!(result.success);
        assert!(started.elapsed() < Duration::from_millis(280));
    }

    #[tokio::test]
    async fn test_sequential_blocks_run_before_parallel_batches() {
        let engine = default_engine();
        let chain = BlockChain::new("order")
            .with_block(BlockInstance::new("p1", "echo").with_parallel(true))
            .with_block(BlockInstance::new("s1", "echo"))
            .with_block(BlockInstance::new("p2", "echo").with_parallel(true))
            .with_block(BlockInstance::new("s2", "echo"));

        let result = engine.execute_chain(&chain, &ExecutionContext::new()).await;

        assert_eq!(result_ids(&result), vec!["s1", "s2", "p1", "p2"]);

        let ids: Vec<&String> = result.outputs.blocks.keys().collect();
        assert_eq!(ids, vec!["p1", "s1", "p2", "s2"]);
    }

    #[tokio::test]
    async fn test_batch_members_cannot_see_each_other() {
        let engine = default_engine();
        let chain = BlockChain::new("iso")
            .with_block(BlockInstance::new("s1", "echo").with_input("v", json!(1)))
            .with_block(BlockInstance::new("p1", "echo").with_parallel(true).with_input("v", json!(2)))
            .with_block(
                BlockInstance::new("p2", "echo")
                    .with_parallel(true)
                    .with_input("sibling", json!("${blocks.p1.v}"))
                    .with_input("earlier", json!("${blocks.s1.v}")),
            );

        let result = engine.execute_chain(&chain, &ExecutionContext::new()).await;

        let p2 = result.outputs.block("p2").unwrap();
        assert_eq!(p2["sibling"], Value::Null);
        assert_eq!(p2["earlier"], json!(1));
    }

    #[tokio::test]
    async fn test_fail_in_batch_finishes_batch_then_halts() {
        let engine = default_engine();
        let chain = BlockChain::new("batch-halt")
            .with_block(
                BlockInstance::new("p1", "fail")
                    .with_parallel(true)
                    .with_error_handler(BlockErrorHandler::Fail),
            )
            .with_block(BlockInstance::new("p2", "fail").with_parallel(true))
            .with_block(BlockInstance::new("s1", "echo"))
            .with_block(BlockInstance::new("p3", "echo").with_parallel(true));

        let result = engine.execute_chain(&chain, &ExecutionContext::new()).await;

        assert!(!result.success);
        assert_eq!(result_ids(&result), vec!["s1", "p1", "p2"]);
        assert_eq!(result.error.as_deref(), Some("Block handler failed: p1 exploded"));
        assert!(result.outputs.block("p3").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_panicking_handler_fails_block() {
        let engine = engine_with(vec![
            (
                "panic",
                handler_fn(|_, _| async {
                    if true {
                        panic!("kaboom");
                    }
                    Ok(BlockOutputs::new())
                }),
            ),
            ("echo", echo_handler()),
        ]);

        let chain = BlockChain::new("p")
            .with_block(BlockInstance::new("bad", "panic"))
            .with_block(BlockInstance::new("good", "echo"));

        let result = engine.execute_chain(&chain, &ExecutionContext::new()).await;

        assert!(!result.success);
        let bad = result.result("bad").unwrap();
        assert!(bad.error.as_deref().unwrap().starts_with("Internal error:"));
        assert!(result.result("good").unwrap().success);
    }

    #[tokio::test]
    async fn test_handler_sees_block_context() {
        let engine = engine_with(vec![(
            "ctx",
            handler_fn(|ctx, config| async move {
                let mut out = BlockOutputs::new();
                out.insert("chain".to_string(), json!(ctx.chain_id));
                out.insert("index".to_string(), json!(ctx.current_block_index));
                out.insert("total".to_string(), json!(ctx.total_blocks));
                out.insert("region".to_string(), ctx.env()["REGION"].clone());
                out.insert("seen".to_string(), json!(ctx.block_outputs.contains_key("first")));
                out.insert("config".to_string(), config);
                Ok(out)
            }),
        )]);

        let chain = BlockChain::new("c9")
            .with_block(BlockInstance::new("first", "ctx"))
            .with_block(BlockInstance::new("second", "ctx").with_config(json!({"k": "v"})));
        let ctx = ExecutionContext::new().with_env_var("REGION", "eu");

        let result = engine.execute_chain(&chain, &ctx).await;
        let second = result.outputs.block("second").unwrap();

        assert_eq!(second["chain"], json!("c9"));
        assert_eq!(second["index"], json!(1));
        assert_eq!(second["total"], json!(2));
        assert_eq!(second["region"], json!("eu"));
        assert_eq!(second["seen"], json!(true));
        assert_eq!(second["config"], json!({"k": "v"}));
        assert_eq!(result.outputs.block("first").unwrap()["seen"], json!(false));
    }

    #[tokio::test]
    async fn test_mock_handler_called_once_per_block() {
        let mut mock = MockBlockHandler::new();
        mock.expect_execute()
            .times(2)
            .returning(|_, _| Ok(BlockOutputs::new()));

        let registry = BlockRegistry::new();
        registry.register("mock", BlockDefinition::new("mock"), Arc::new(mock));
        let engine = BlockExecutionEngine::new(registry);

        let chain = BlockChain::new("m")
            .with_block(BlockInstance::new("a", "mock"))
            .with_block(BlockInstance::new("b", "mock").with_parallel(true));

        let result = engine.execute_chain(&chain, &ExecutionContext::new()).await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_duplicate_ids_last_write_wins() {
        let engine = default_engine();
        let chain = BlockChain::new("dup")
            .with_block(BlockInstance::new("a", "echo").with_input("v", json!(1)))
            .with_block(BlockInstance::new("a", "echo").with_input("v", json!(2)));

        let result = engine.execute_chain(&chain, &ExecutionContext::new()).await;

        assert_eq!(result.results.len(), 2);
        assert_eq!(result.outputs.blocks.len(), 1);
        assert_eq!(result.outputs.block("a").unwrap()["v"], json!(2));
    }

    #[tokio::test]
    async fn test_execute_block_directly() {
        let engine = default_engine();
        let block = BlockInstance::new("x", "echo").with_input("v", json!(1));
        let ctx = BlockExecutionContext::new(
            block.inputs.clone(),
            Arc::new(ExecutionContext::new()),
            Arc::new(BlockOutputsMap::new()),
            "x",
            "echo",
            "direct",
            0,
            1,
        );

        let result = engine.execute_block(&block, ctx).await;

        assert!(result.success);
        assert_eq!(result.outputs["v"], json!(1));
        assert_eq!(result.block_type, "echo");
    }
}
