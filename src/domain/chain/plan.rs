//! Execution plan
//!
//! Partitions a chain's declared blocks into the sequential list and the
//! parallel batches. Each contiguous run of `parallel` blocks becomes one
//! batch; every other block goes, in order, into the sequential list.
//!
//! A run executes the whole sequential list first and the batches after it,
//! so interleaved declarations such as `seq, [par, par], seq` run as
//! `seq, seq, [par, par]`.

use crate::domain::block::{BlockChain, BlockInstance};

/// A block together with its position in the declared block list
#[derive(Debug, Clone, Copy)]
pub struct PlannedBlock<'a> {
    pub index: usize,
    pub block: &'a BlockInstance,
}

#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan<'a> {
    pub sequential: Vec<PlannedBlock<'a>>,
    pub parallel_batches: Vec<Vec<PlannedBlock<'a>>>,
}

impl<'a> ExecutionPlan<'a> {
    pub fn build(chain: &'a BlockChain) -> Self {
        let mut plan = Self::default();
        let mut current_batch: Vec<PlannedBlock<'a>> = Vec::new();

        for (index, block) in chain.blocks.iter().enumerate() {
            let planned = PlannedBlock { index, block };

            if block.parallel {
                current_batch.push(planned);
            } else {
                if !current_batch.is_empty() {
                    plan.parallel_batches.push(std::mem::take(&mut current_batch));
                }
                plan.sequential.push(planned);
            }
        }

        if !current_batch.is_empty() {
            plan.parallel_batches.push(current_batch);
        }

        plan
    }

    /// Number of planned blocks across both phases
    pub fn len(&self) -> usize {
        self.sequential.len() + self.parallel_batches.iter().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
