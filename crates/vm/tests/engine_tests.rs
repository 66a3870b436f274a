//! End-to-end interpreter tests: small contracts assembled with
//! [`ScriptBuilder`] and driven through the public `invoke` surface.

use floe_vm::{
    CallContext, FunctionDef, InvocationEngine, ModuleState, OpCode, Param, ParamKind, Program,
    ScriptBuilder, SyscallId, VmError, MAX_INT_BYTES, MAX_VALUE_DEPTH,
};

fn export(name: &str, offset: u32, params: Vec<Param>, returns: bool, safe: bool) -> FunctionDef {
    FunctionDef {
        name: name.into(),
        offset,
        params,
        locals: 0,
        returns,
        exported: true,
        safe,
    }
}

fn module(sb: ScriptBuilder, functions: Vec<FunctionDef>) -> ModuleState {
    ModuleState::new(Program::new(sb.into_script(), functions, 0).unwrap())
}

/// `bump` reads a counter out of storage, increments it and writes it
/// back; `peek` is the read-only view of the same key.
fn counter_module() -> ModuleState {
    let mut sb = ScriptBuilder::new();

    let bump_offset = sb.offset() as u32;
    sb.emit_push_data(b"count");
    sb.emit_syscall(SyscallId::StorageRead);
    sb.emit(OpCode::Dup);
    sb.emit(OpCode::IsNull);
    let have_value = sb.emit_jump(OpCode::JmpIfNot);
    sb.emit(OpCode::Drop);
    sb.emit_push_int(0);
    let joined = sb.emit_jump(OpCode::Jmp);
    sb.patch_jump_here(have_value).unwrap();
    sb.emit(OpCode::Btoi);
    sb.patch_jump_here(joined).unwrap();
    sb.emit_push_int(1);
    sb.emit(OpCode::Add);
    sb.emit(OpCode::Dup);
    sb.emit(OpCode::Itob);
    sb.emit_push_data(b"count");
    sb.emit(OpCode::Swap);
    sb.emit_syscall(SyscallId::StorageWrite);
    sb.emit(OpCode::Drop);
    sb.emit(OpCode::Ret);

    let peek_offset = sb.offset() as u32;
    sb.emit_push_data(b"count");
    sb.emit_syscall(SyscallId::StorageRead);
    sb.emit(OpCode::Dup);
    sb.emit(OpCode::IsNull);
    let have_value = sb.emit_jump(OpCode::JmpIfNot);
    sb.emit(OpCode::Drop);
    sb.emit_push_int(0);
    let joined = sb.emit_jump(OpCode::Jmp);
    sb.patch_jump_here(have_value).unwrap();
    sb.emit(OpCode::Btoi);
    sb.patch_jump_here(joined).unwrap();
    sb.emit(OpCode::Ret);

    module(
        sb,
        vec![
            export("bump", bump_offset, vec![], true, false),
            export("peek", peek_offset, vec![], true, true),
        ],
    )
}

#[test]
fn counter_increments_across_calls() {
    let mut state = counter_module();
    let engine = InvocationEngine::new();
    let ctx = CallContext::new("alice.near");

    assert_eq!(engine.invoke(&mut state, 0, b"{}", &ctx).result.unwrap(), b"1");
    assert_eq!(engine.invoke(&mut state, 0, b"", &ctx).result.unwrap(), b"2");
    assert_eq!(engine.invoke(&mut state, 1, b"", &ctx).result.unwrap(), b"2");
    assert_eq!(state.storage().get(b"count".as_slice()), Some(&vec![2u8]));
}

#[test]
fn view_entry_point_cannot_write() {
    let mut sb = ScriptBuilder::new();
    sb.emit_push_data(b"seen");
    sb.emit_push_data(b"1");
    sb.emit_syscall(SyscallId::StorageWrite);
    sb.emit(OpCode::Drop);
    sb.emit(OpCode::Ret);
    let mut state = module(sb, vec![export("watch", 0, vec![], false, true)]);

    let outcome = InvocationEngine::new().invoke(&mut state, 0, b"", &CallContext::default());
    assert_eq!(
        outcome.result,
        Err(VmError::ReadOnlyWrite { what: "storage" })
    );
    assert!(state.storage().is_empty());
}

#[test]
fn call_context_reaches_the_contract() {
    let mut sb = ScriptBuilder::new();
    let whoami = sb.offset() as u32;
    sb.emit_syscall(SyscallId::PredecessorAccountId);
    sb.emit(OpCode::Ret);
    let deposit = sb.offset() as u32;
    sb.emit_syscall(SyscallId::AttachedDeposit);
    sb.emit(OpCode::Ret);
    let now = sb.offset() as u32;
    sb.emit_syscall(SyscallId::BlockTimestamp);
    sb.emit(OpCode::Ret);
    let mut state = module(
        sb,
        vec![
            export("whoami", whoami, vec![], true, true),
            export("deposit", deposit, vec![], true, true),
            export("now", now, vec![], true, true),
        ],
    );

    let attached: u128 = 250_000_000_000_000_000_000_000_000;
    let ctx = CallContext::new("bettor.near")
        .with_deposit(attached)
        .with_timestamp(1_700_000_000_000_000_000);
    let engine = InvocationEngine::new();

    assert_eq!(
        engine.invoke(&mut state, 0, b"", &ctx).result.unwrap(),
        br#""bettor.near""#
    );
    // Wider than u64, so the marshaller renders a decimal string.
    assert_eq!(
        engine.invoke(&mut state, 1, b"", &ctx).result.unwrap(),
        format!("\"{attached}\"").into_bytes()
    );
    assert_eq!(
        engine.invoke(&mut state, 2, b"", &ctx).result.unwrap(),
        b"1700000000000000000"
    );
}

#[test]
fn identical_calls_produce_identical_outcomes() {
    let mut left = counter_module();
    let mut right = left.clone();
    let engine = InvocationEngine::new();
    let ctx = CallContext::new("alice.near").with_deposit(7);

    let a = engine.invoke(&mut left, 0, b"{}", &ctx);
    let b = engine.invoke(&mut right, 0, b"{}", &ctx);
    assert_eq!(a.result.unwrap(), b.result.unwrap());
    assert_eq!(left, right);
}

#[test]
fn compound_return_values_render_as_json() {
    let mut sb = ScriptBuilder::new();
    sb.emit(OpCode::NewMap);
    sb.emit_push_str("players");
    sb.emit(OpCode::NewArray);
    sb.emit_push_str("ann");
    sb.emit(OpCode::Append);
    sb.emit_push_str("bob");
    sb.emit(OpCode::Append);
    sb.emit(OpCode::SetItem);
    sb.emit_push_str("pot");
    sb.emit_push_int(300);
    sb.emit(OpCode::SetItem);
    sb.emit(OpCode::Ret);
    let mut state = module(sb, vec![export("roster", 0, vec![], true, true)]);

    let outcome = InvocationEngine::new().invoke(&mut state, 0, b"", &CallContext::default());
    assert_eq!(
        outcome.result.unwrap(),
        br#"{"players":["ann","bob"],"pot":300}"#
    );
}

#[test]
fn runaway_nesting_faults() {
    let mut sb = ScriptBuilder::new();
    sb.emit(OpCode::NewArray);
    for _ in 0..MAX_VALUE_DEPTH + 4 {
        sb.emit(OpCode::NewArray);
        sb.emit(OpCode::Swap);
        sb.emit(OpCode::Append);
    }
    sb.emit(OpCode::Ret);
    let mut state = module(sb, vec![export("nest", 0, vec![], true, false)]);

    let outcome = InvocationEngine::new().invoke(&mut state, 0, b"", &CallContext::default());
    assert_eq!(
        outcome.result,
        Err(VmError::ValueTooDeep {
            limit: MAX_VALUE_DEPTH
        })
    );
}

#[test]
fn integer_width_is_capped() {
    let mut sb = ScriptBuilder::new();
    sb.emit_push_int(i64::MAX);
    for _ in 0..3 {
        sb.emit(OpCode::Dup);
        sb.emit(OpCode::Mul);
    }
    sb.emit(OpCode::Ret);
    let mut state = module(sb, vec![export("grow", 0, vec![], true, false)]);

    let outcome = InvocationEngine::new().invoke(&mut state, 0, b"", &CallContext::default());
    assert_eq!(
        outcome.result,
        Err(VmError::IntegerOverflow { max: MAX_INT_BYTES })
    );
}

#[test]
fn binary_returns_render_as_base64() {
    let mut sb = ScriptBuilder::new();
    sb.emit_push_data(&[0xff, 0xfe]);
    sb.emit(OpCode::Ret);
    let mut state = module(sb, vec![export("blob", 0, vec![], true, true)]);

    let outcome = InvocationEngine::new().invoke(&mut state, 0, b"", &CallContext::default());
    assert_eq!(outcome.result.unwrap(), br#""//4=""#);
}

#[test]
fn bad_arguments_fault_before_execution() {
    let mut sb = ScriptBuilder::new();
    sb.emit_slot(OpCode::LdLoc, 0);
    sb.emit(OpCode::Ret);
    let mut state = module(
        sb,
        vec![export("echo", 0, vec![Param::new("n", ParamKind::Int)], true, true)],
    );

    let outcome = InvocationEngine::new().invoke(
        &mut state,
        0,
        br#"{"n": "not a number"}"#,
        &CallContext::default(),
    );
    match outcome.result {
        Err(VmError::Argument { message }) => assert!(message.contains("argument `n`")),
        other => panic!("expected an argument fault, got {other:?}"),
    }
}
