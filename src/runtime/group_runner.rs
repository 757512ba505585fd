//! 生成物の実行
//!
//! `GeneratedUnit` 1つ分の `RecursionRunner`。結果スロットを持ち、
//! ディスパッチフレームの判別子でステップ手続きを選び、エントリポイントから
//! 呼び出せるようにする。

use log::debug;

use crate::ast::Program;
use crate::codegen::GeneratedUnit;
use crate::error::RuntimeError;

use super::cursor::{Cursor, CursorContext, DispatchFrame};
use super::interpreter::{Effects, Interpreter, ResultSlots};
use super::trampoline::{RecursionRunner, RunStats, Step};
use super::Value;

/// 1つの再帰グループのランナー
pub struct GroupRunner<'p, 'u> {
    unit: &'u GeneratedUnit,
    interpreter: Interpreter<'p>,
    slots: ResultSlots,
    last_stats: RunStats,
}

impl<'p, 'u> GroupRunner<'p, 'u> {
    /// グループ外の関数の呼び出しは `program` を直接実行する
    pub fn new(program: &'p Program, unit: &'u GeneratedUnit) -> Self {
        Self::with_interpreter(Interpreter::new(program), unit)
    }

    pub fn with_interpreter(interpreter: Interpreter<'p>, unit: &'u GeneratedUnit) -> Self {
        Self {
            unit,
            interpreter,
            slots: ResultSlots::new(),
            last_stats: RunStats::default(),
        }
    }

    pub fn unit(&self) -> &'u GeneratedUnit {
        self.unit
    }

    pub fn effects(&self) -> &Effects {
        self.interpreter.effects()
    }

    pub fn take_effects(&mut self) -> Effects {
        self.interpreter.take_effects()
    }

    pub fn slots(&self) -> &ResultSlots {
        &self.slots
    }

    pub fn last_stats(&self) -> RunStats {
        self.last_stats
    }

    /// エントリポイントを名前で呼ぶ。値を返さない関数では `None`
    pub fn invoke(&mut self, entry_point: &str, args: Vec<Value>) -> Result<Option<Value>, RuntimeError> {
        let unit = self.unit;
        let entry = unit
            .entry_point(entry_point)
            .ok_or_else(|| RuntimeError::UnknownFunction {
                name: entry_point.to_string(),
            })?;
        if args.len() != entry.params.len() {
            return Err(RuntimeError::ArgumentCountMismatch {
                name: entry.name.clone(),
                expected: entry.params.len(),
                found: args.len(),
            });
        }

        self.slots.clear();
        let stats = self.run_recursion(DispatchFrame { tag: entry.tag, args })?;
        self.last_stats = stats;
        debug!(
            "{}: {} 回の呼び出し, 最大の深さ {}",
            entry.name, stats.calls, stats.max_depth
        );

        match &entry.result_slot {
            Some(_) => self
                .slots
                .read(entry.member)
                .cloned()
                .map(Some)
                .ok_or_else(|| RuntimeError::MissingReturn {
                    function: entry.function.clone(),
                }),
            None => Ok(None),
        }
    }
}

impl<'p, 'u> RecursionRunner for GroupRunner<'p, 'u> {
    type Frame = DispatchFrame;
    type Cursor = Cursor<'u>;
    type Error = RuntimeError;

    fn start(&mut self, frame: DispatchFrame) -> Result<Cursor<'u>, RuntimeError> {
        let step = self
            .unit
            .runner
            .step_for_tag(frame.tag)
            .ok_or(RuntimeError::BadDispatch { tag: frame.tag })?;
        Cursor::new(step, frame.args)
    }

    fn resume(&mut self, cursor: &mut Cursor<'u>) -> Result<Step<DispatchFrame>, RuntimeError> {
        let mut ctx = CursorContext {
            interpreter: &mut self.interpreter,
            slots: &mut self.slots,
            unit: self.unit,
        };
        cursor.resume(&mut ctx)
    }
}
