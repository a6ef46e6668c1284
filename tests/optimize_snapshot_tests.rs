//! `insta` snapshots of the `Display` dump (`FunctionPrinter`) of a function
//! before and after `optimize`, for two representative cases: one where
//! `EQ`-chain simplification fires, one where nothing in the function is
//! foldable at all and the dump must come back unchanged (P6).
//!
//! Both cases are built to be hand-traceable without running the pipeline:
//! neither touches a branch, so `TRACE`/`THREAD` never fire and the only
//! phase that can change the IR is `FOLD`.

use traceopt::ir::builder::FunctionBuilder;
use traceopt::ir::opcode::Opcode;
use traceopt::ir::printer::FunctionPrinter;
use traceopt::ir::types::Type;
use traceopt::ir::value::Value;
use traceopt::{optimize, OptimizerConfig};

#[test]
fn eq_chain_trivial_pair_drops_out() {
    let mut b = FunctionBuilder::new("eq_fold");
    let entry = b.entry();
    let v0 = b.param(entry, Type::I32);
    let k1 = b.const_i32(5);
    let k2 = b.const_i32(5);
    let v1 = b.op(entry, Opcode::Eq, Type::Bool, vec![k1, k2, Value::Handle(v0), Value::Handle(v0)]);
    let mut func = b.finish();
    let _ = v1;

    insta::assert_snapshot!(FunctionPrinter(&func).to_string(), @r"
    fn eq_fold() {
    B0:
        v0 = param() : i32
        v1 = eq(5i32, 5i32, v0, v0) : bool
    }
    ");

    optimize(&mut func, &OptimizerConfig::default()).unwrap();

    insta::assert_snapshot!(FunctionPrinter(&func).to_string(), @r"
    fn eq_fold() {
    B0:
        v0 = param() : i32
        v1 = eq(v0, v0) : bool
    }
    ");
}

#[test]
fn unused_arithmetic_result_is_never_touched() {
    let mut b = FunctionBuilder::new("no_fold_possible");
    let entry = b.entry();
    let v0 = b.param(entry, Type::I32);
    let seven = b.const_i32(7);
    b.op(entry, Opcode::Add, Type::I32, vec![Value::Handle(v0), seven]);
    let mut func = b.finish();

    let before = FunctionPrinter(&func).to_string();
    insta::assert_snapshot!(before.clone(), @r"
    fn no_fold_possible() {
    B0:
        v0 = param() : i32
        v1 = add(v0, 7i32) : i32
    }
    ");

    let updated = optimize(&mut func, &OptimizerConfig::default()).unwrap();
    assert!(!updated, "nothing in this function is foldable: v1 has no uses, so fold_constants skips it");

    let after = FunctionPrinter(&func).to_string();
    assert_eq!(before, after, "optimize() must not touch a function it reports as unchanged");
    insta::assert_snapshot!(after, @r"
    fn no_fold_possible() {
    B0:
        v0 = param() : i32
        v1 = add(v0, 7i32) : i32
    }
    ");
}
