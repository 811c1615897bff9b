use cranelift_codegen::{
    ir::{
        condcodes::IntCC, types, AbiParam, Block, ExtFuncData, ExternalName,
        FuncRef, Function, InstBuilder, MemFlags, Signature, StackSlotData,
        StackSlotKind, Type, UserFuncName, Value,
    },
    isa::{CallConv, TargetFrontendConfig},
};
use cranelift_frontend::{FunctionBuilder, FunctionBuilderContext, Variable};
use target_lexicon::PointerWidth;
use thiserror::Error;
use tracing::{debug, trace};

use crate::frontend::{Command, Position, SourceCursor};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TranslateError {
    #[error("unmatched ']' at {0}")]
    UnmatchedCloseBracket(Position),
    #[error("unclosed '[' opened at {0}")]
    UnmatchedOpenBracket(Position),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub const DEFAULT_CELL_COUNT: u32 = 3_000;

const CELL: Type = types::I8;
const POINTER: Type = types::I64;
const STATUS: Type = types::I32;
const CALL_CONV: CallConv = CallConv::SystemV;

pub const OUTPUT_PRIMITIVE: &str = "putchar";
pub const INPUT_PRIMITIVE: &str = "getchar";

#[derive(Clone, Debug)]
pub struct TranslatorConfig {
    /// Number of byte cells on the tape.
    pub cells: u32,
    /// Name the printed module is labelled with, usually the source path.
    pub module_name: String,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        TranslatorConfig {
            cells: DEFAULT_CELL_COUNT,
            module_name: String::from("main"),
        }
    }
}

impl TranslatorConfig {
    fn validate(&self) -> Result<(), TranslateError> {
        if self.cells == 0 {
            return Err(TranslateError::InvalidConfig(
                "the tape needs at least one cell".into(),
            ));
        }

        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TranslationStats {
    pub commands: usize,
    pub comments: usize,
    pub loops: usize,
    pub max_depth: usize,
}

pub struct Translation {
    pub function: Function,
    pub stats: TranslationStats,
}

/// An open `[` waiting for its `]`.
#[derive(Clone, Copy, Debug)]
struct LoopFrame {
    body: Block,
    exit: Block,
    opened_at: Position,
}

pub fn frontend_config() -> TargetFrontendConfig {
    TargetFrontendConfig {
        default_call_conv: CALL_CONV,
        pointer_width: PointerWidth::U64,
        page_size_align_log2: 12,
    }
}

pub fn main_signature() -> Signature {
    let mut sig = Signature::new(CALL_CONV);
    sig.returns.push(AbiParam::new(STATUS));
    sig
}

fn declare_primitive(
    builder: &mut FunctionBuilder,
    name: &str,
    params: &[Type],
) -> FuncRef {
    let mut sig = Signature::new(CALL_CONV);
    sig.params.extend(params.iter().map(|&ty| AbiParam::new(ty)));
    sig.returns.push(AbiParam::new(STATUS));

    let signature = builder.import_signature(sig);
    builder.import_function(ExtFuncData {
        name: ExternalName::testcase(name),
        signature,
        colocated: false,
    })
}

/// Emits the body of `main` one command at a time.
///
/// The tape is a stack slot of `main`; the cursor is an index into it kept in
/// an SSA variable, turned into an address only when a cell is touched. No
/// bounds are checked, so walking off either end of the tape is left to the
/// generated program.
///
/// After an unmatched `]` the translator refuses every further command, so
/// nothing past the offending bracket is ever emitted.
pub struct Translator<'a> {
    builder: FunctionBuilder<'a>,
    tape: Value,
    cursor: Variable,
    putchar: FuncRef,
    getchar: FuncRef,
    loops: Vec<LoopFrame>,
    stats: TranslationStats,
    halted: Option<Position>,
}

impl<'a> Translator<'a> {
    /// Starts a fresh `%main` in `function`, replacing whatever it held.
    pub fn new(
        function: &'a mut Function,
        context: &'a mut FunctionBuilderContext,
        config: &TranslatorConfig,
    ) -> Result<Self, TranslateError> {
        config.validate()?;

        *function =
            Function::with_name_signature(UserFuncName::testcase("main"), main_signature());
        let mut builder = FunctionBuilder::new(function, context);

        let entry = builder.create_block();
        builder.switch_to_block(entry);
        builder.seal_block(entry);

        // setup
        let slot = builder.create_sized_stack_slot(StackSlotData::new(
            StackSlotKind::ExplicitSlot,
            config.cells,
            0,
        ));
        let tape = builder.ins().stack_addr(POINTER, slot, 0);
        let fill = builder.ins().iconst(CELL, 0i64);
        let len = builder.ins().iconst(POINTER, i64::from(config.cells));
        builder.call_memset(frontend_config(), tape, fill, len);

        let cursor = Variable::from_u32(0);
        builder.declare_var(cursor, POINTER);
        let start = builder.ins().iconst(POINTER, 0i64);
        builder.def_var(cursor, start);

        let putchar = declare_primitive(&mut builder, OUTPUT_PRIMITIVE, &[CELL]);
        let getchar = declare_primitive(&mut builder, INPUT_PRIMITIVE, &[]);

        Ok(Translator {
            builder,
            tape,
            cursor,
            putchar,
            getchar,
            loops: Vec::new(),
            stats: TranslationStats::default(),
            halted: None,
        })
    }

    pub fn stats(&self) -> TranslationStats {
        self.stats
    }

    pub fn command(
        &mut self,
        at: Position,
        command: Command,
    ) -> Result<(), TranslateError> {
        if let Some(offender) = self.halted {
            return Err(TranslateError::UnmatchedCloseBracket(offender));
        }

        use Command as C;
        match command {
            C::Movr => self.emit_shift(1),
            C::Movl => self.emit_shift(-1),
            C::Incr => self.emit_add(1),
            C::Decr => self.emit_add(-1),
            C::Writ => self.emit_write(),
            C::Read => self.emit_read(),
            C::JmpF => self.emit_loop_open(at),
            C::JmpB => self.emit_loop_close(at)?,
        }

        self.stats.commands += 1;

        Ok(())
    }

    /// Closes off `main` with `return 0`. Fails if any `[` is still open,
    /// pointing at the most recently opened one.
    pub fn finish(mut self) -> Result<TranslationStats, TranslateError> {
        if let Some(offender) = self.halted {
            return Err(TranslateError::UnmatchedCloseBracket(offender));
        }
        if let Some(frame) = self.loops.last() {
            return Err(TranslateError::UnmatchedOpenBracket(frame.opened_at));
        }

        let status = self.builder.ins().iconst(STATUS, 0i64);
        self.builder.ins().return_(&[status]);

        self.builder.seal_all_blocks();
        self.builder.finalize();

        Ok(self.stats)
    }

    fn cell_address(&mut self) -> Value {
        let index = self.builder.use_var(self.cursor);
        self.builder.ins().iadd(self.tape, index)
    }

    fn load_cell(&mut self) -> (Value, Value) {
        let address = self.cell_address();
        let value = self.builder.ins().load(CELL, MemFlags::new(), address, 0);
        (address, value)
    }

    fn cell_is_nonzero(&mut self) -> Value {
        let (_, value) = self.load_cell();
        self.builder.ins().icmp_imm(IntCC::NotEqual, value, 0i64)
    }

    fn emit_shift(&mut self, amount: i64) {
        let index = self.builder.use_var(self.cursor);
        let moved = self.builder.ins().iadd_imm(index, amount);
        self.builder.def_var(self.cursor, moved);
    }

    // i8 arithmetic wraps, so `-` on 0 gives 255 and `+` on 255 gives 0
    fn emit_add(&mut self, amount: i64) {
        let (address, value) = self.load_cell();
        let value = self.builder.ins().iadd_imm(value, amount);
        self.builder.ins().store(MemFlags::new(), value, address, 0);
    }

    fn emit_write(&mut self) {
        let (_, value) = self.load_cell();
        self.builder.ins().call(self.putchar, &[value]);
    }

    fn emit_read(&mut self) {
        let call = self.builder.ins().call(self.getchar, &[]);
        let status = self.builder.inst_results(call)[0];
        let byte = self.builder.ins().ireduce(CELL, status);
        let address = self.cell_address();
        self.builder.ins().store(MemFlags::new(), byte, address, 0);
    }

    fn emit_loop_open(&mut self, at: Position) {
        let nonzero = self.cell_is_nonzero();

        let body = self.builder.create_block();
        let exit = self.builder.create_block();
        self.builder.ins().brif(nonzero, body, &[], exit, &[]);

        self.loops.push(LoopFrame {
            body,
            exit,
            opened_at: at,
        });
        self.stats.max_depth = self.stats.max_depth.max(self.loops.len());
        trace!(%at, depth = self.loops.len(), ?body, ?exit, "loop opened");

        self.builder.switch_to_block(body);
    }

    fn emit_loop_close(&mut self, at: Position) -> Result<(), TranslateError> {
        let Some(frame) = self.loops.pop() else {
            self.halted = Some(at);
            return Err(TranslateError::UnmatchedCloseBracket(at));
        };

        let nonzero = self.cell_is_nonzero();
        self.builder
            .ins()
            .brif(nonzero, frame.body, &[], frame.exit, &[]);
        trace!(%at, opened_at = %frame.opened_at, "loop closed");

        self.stats.loops += 1;
        self.builder.switch_to_block(frame.exit);

        Ok(())
    }
}

/// Translates a whole program into the body of `main`.
pub fn translate(
    source: &[u8],
    config: &TranslatorConfig,
) -> Result<Translation, TranslateError> {
    let mut function = Function::new();
    let mut context = FunctionBuilderContext::new();

    let mut cursor = SourceCursor::new(source);
    let mut translator = Translator::new(&mut function, &mut context, config)?;

    for (at, command) in cursor.by_ref() {
        translator.command(at, command)?;
    }

    let mut stats = translator.finish()?;
    stats.comments = cursor.comments();

    debug!(
        commands = stats.commands,
        comments = stats.comments,
        loops = stats.loops,
        max_depth = stats.max_depth,
        cells = config.cells,
        "translated program"
    );

    Ok(Translation { function, stats })
}
