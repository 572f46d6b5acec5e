use framemachine_core::{Machine, Pool, PoolBuilder, PoolConfig, PopulationSnapshot};
use framemachine_data::{CmpType, CodeFrame, Instruction, NegSelect, OpSelect};
use std::time::{Duration, Instant};

/// Every cell runs `instruction`.
#[allow(dead_code)]
pub fn uniform_machine(instruction: Instruction) -> Machine {
    Machine::new(CodeFrame::filled(instruction))
}

/// Reads cells 1 and 2, tests cell 3 with `cmp_type`.
#[allow(dead_code)]
pub fn instruction(cmp_type: CmpType, op_select: OpSelect, neg_select: NegSelect) -> Instruction {
    Instruction {
        cmp_addr: 3,
        arg0_addr: 1,
        arg1_addr: 2,
        cmp_type,
        op_select,
        neg_select,
    }
}

/// Copies the input into every cell.
#[allow(dead_code)]
pub fn all_input() -> Instruction {
    Instruction {
        cmp_addr: 0,
        arg0_addr: 0,
        arg1_addr: 0,
        cmp_type: CmpType::NotZero,
        op_select: OpSelect::Input,
        neg_select: NegSelect::empty(),
    }
}

/// Keeps every machine; the population never changes size.
#[allow(dead_code)]
pub fn keep_all(snapshot: &PopulationSnapshot<i64>) -> Vec<Machine> {
    snapshot.iter().map(|m| m.machine.clone()).collect()
}

/// Builder for `i32 -> i64 -> i32` test pools.
#[allow(dead_code)]
pub struct TestPool {
    config: PoolConfig,
    interval: u64,
}

#[allow(dead_code)]
impl TestPool {
    pub fn new() -> Self {
        Self {
            config: PoolConfig {
                population_size: 16,
                seed: Some(7),
                stop_timeout_ms: 2000,
                ..PoolConfig::default()
            },
            interval: 8,
        }
    }

    pub fn with_population(mut self, size: usize) -> Self {
        self.config.population_size = size;
        self
    }

    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_config<F>(mut self, modifier: F) -> Self
    where
        F: FnOnce(&mut PoolConfig),
    {
        modifier(&mut self.config);
        self
    }

    /// A builder counting outputs equal to the input, with every component
    /// except the input stream set.
    pub fn builder(self) -> PoolBuilder<i32, i64, i32> {
        Pool::builder()
            .input_converter(|x: &i32| *x)
            .output_converter(|o| o)
            .fitness(|x: &i32, score: i64, out: i32| if out == *x { score + 1 } else { score })
            .selection(keep_all)
            .selection_interval(self.interval)
            .config(self.config)
    }
}

/// Polls `condition` until it holds or `timeout` elapses.
#[allow(dead_code)]
pub fn eventually<F: FnMut() -> bool>(timeout: Duration, mut condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}
