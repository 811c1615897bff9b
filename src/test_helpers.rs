use std::collections::HashMap;

use cranelift_codegen::{
    flowgraph::ControlFlowGraph,
    ir::{
        ExternalName, Function, InstructionData, LibCall, Opcode, Type,
    },
};
use itertools::Itertools;

use crate::backend::{translate, TranslatorConfig};

/// Block count and edges of a function, with blocks numbered by their
/// position in the layout so two translations can be compared regardless of
/// how the entities were allocated.
#[derive(Debug, PartialEq, Eq)]
pub struct Shape {
    pub blocks: usize,
    pub edges: Vec<(usize, usize)>,
}

pub fn translate_default(source: &str) -> Function {
    translate(source.as_bytes(), &TranslatorConfig::default())
        .unwrap()
        .function
}

pub fn shape(function: &Function) -> Shape {
    let cfg = ControlFlowGraph::with_function(function);
    let order: HashMap<_, _> = function
        .layout
        .blocks()
        .enumerate()
        .map(|(i, block)| (block, i))
        .collect();

    let edges = function
        .layout
        .blocks()
        .flat_map(|from| cfg.succ_iter(from).map(move |to| (from, to)))
        .map(|(from, to)| (order[&from], order[&to]))
        .sorted()
        .dedup()
        .collect();

    Shape {
        blocks: order.len(),
        edges,
    }
}

/// Opcodes of every instruction, in layout order.
pub fn opcodes(function: &Function) -> Vec<Opcode> {
    function
        .layout
        .blocks()
        .flat_map(|block| function.layout.block_insts(block))
        .map(|inst| function.dfg.insts[inst].opcode())
        .collect()
}

pub fn opcode_counts(function: &Function) -> HashMap<Opcode, usize> {
    opcodes(function).into_iter().counts()
}

/// Every `iadd_imm` as the type it operates on and its immediate, in
/// layout order.
pub fn immediate_adds(function: &Function) -> Vec<(Type, i64)> {
    function
        .layout
        .blocks()
        .flat_map(|block| function.layout.block_insts(block))
        .filter_map(|inst| match function.dfg.insts[inst] {
            InstructionData::BinaryImm64 {
                opcode: Opcode::IaddImm,
                arg,
                imm,
            } => Some((function.dfg.value_type(arg), imm.bits())),
            _ => None,
        })
        .collect()
}

fn callees(function: &Function) -> impl Iterator<Item = &ExternalName> + '_ {
    function
        .layout
        .blocks()
        .flat_map(|block| function.layout.block_insts(block))
        .filter_map(|inst| match function.dfg.insts[inst] {
            InstructionData::Call { func_ref, .. } => {
                Some(&function.dfg.ext_funcs[func_ref].name)
            }
            _ => None,
        })
}

/// Number of call sites that target the named external function.
pub fn calls_to(function: &Function, name: &str) -> usize {
    let name = ExternalName::testcase(name);
    callees(function).filter(|&callee| *callee == name).count()
}

pub fn memset_calls(function: &Function) -> usize {
    let memset = ExternalName::LibCall(LibCall::Memset);
    callees(function).filter(|&callee| *callee == memset).count()
}
