//! Benchmarks `optimize()` over two synthetic shapes: a deep diamond of
//! nested conditionals (stresses trace insertion + jump threading) and a
//! long counted loop (stresses widening).

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use traceopt::ir::builder::FunctionBuilder;
use traceopt::ir::function::Function;
use traceopt::ir::opcode::Opcode;
use traceopt::ir::types::Type;
use traceopt::ir::value::Value;
use traceopt::{optimize, OptimizerConfig};

/// A chain of `depth` nested `if a < k -> then; else -> next` diamonds, all
/// sharing the same condition variable so every test after the first is
/// threadable.
fn deep_diamond(depth: usize) -> Function {
    let mut b = FunctionBuilder::new("deep_diamond");
    let mut block = b.entry();
    let a = b.param(block, Type::I32);

    for i in 0..depth {
        let k = b.const_i32(i as i32 * 2);
        let cmp = b.op(block, Opcode::Lt, Type::I32, vec![Value::Handle(a), k]);
        let then_blk = b.add_block();
        let next_blk = b.add_block();
        b.add_edge(block, then_blk);
        b.add_edge(block, next_blk);
        b.branch(block, cmp);
        b.op(then_blk, Opcode::Trace, Type::I32, vec![Value::Handle(a)]);
        block = next_blk;
    }
    b.finish()
}

/// `i = phi(0, i+1); i < bound -> loop : exit`, a single induction variable
/// whose bounds only stabilize once widening kicks in.
fn long_loop(bound: i32) -> Function {
    let mut b = FunctionBuilder::new("long_loop");
    let entry = b.entry();
    let header = b.add_block();
    let exit_blk = b.add_block();
    b.add_edge(entry, header);
    b.add_edge(header, header);
    b.add_edge(header, exit_blk);

    let zero = b.const_i32(0);
    let i_phi = b.phi(header, Type::I32, vec![zero, zero]);
    let one = b.const_i32(1);
    let i_next = b.op(header, Opcode::Add, Type::I32, vec![Value::Handle(i_phi), one]);
    let bound_val = b.const_i32(bound);
    let cmp = b.op(header, Opcode::Lt, Type::Bool, vec![Value::Handle(i_phi), bound_val]);
    b.branch(header, cmp);

    let mut func = b.finish();
    func.link_change_input(i_phi, 1, Value::Handle(i_next));
    func
}

fn bench_deep_diamond(c: &mut Criterion) {
    let mut group = c.benchmark_group("deep_diamond");
    for depth in [4usize, 16, 64] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            b.iter_batched(|| deep_diamond(depth), |mut func| optimize(&mut func, &OptimizerConfig::default()).unwrap(), criterion::BatchSize::SmallInput);
        });
    }
    group.finish();
}

fn bench_long_loop(c: &mut Criterion) {
    let mut group = c.benchmark_group("long_loop");
    for bound in [100i32, 10_000, 1_000_000] {
        group.bench_with_input(BenchmarkId::from_parameter(bound), &bound, |b, &bound| {
            b.iter_batched(|| long_loop(bound), |mut func| optimize(&mut func, &OptimizerConfig::default()).unwrap(), criterion::BatchSize::SmallInput);
        });
    }
    group.finish();
}

criterion_group!(benches, bench_deep_diamond, bench_long_loop);
criterion_main!(benches);
