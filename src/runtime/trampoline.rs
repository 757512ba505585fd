//! 汎用トランポリン
//!
//! 一時停止したカーソルを明示的なスタックに積み、ネイティブの呼び出し
//! スタックを使わずに呼び出し木全体を実行する。子カーソルが完了するまで
//! 親カーソルは再開されないので、結果スロットは読まれる前に必ず書かれている。

use log::trace;
use serde::Serialize;

/// カーソルを1段進めた結果
#[derive(Debug, Clone, PartialEq)]
pub enum Step<F> {
    /// 子の呼び出しを要求して一時停止した
    Call(F),
    /// 完了した
    Return,
}

/// 1回の実行の統計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// カーソルを進めた回数
    pub steps: u64,
    /// 開始したカーソルの数（最初の呼び出しを含む）
    pub calls: u64,
    /// 明示的スタックの最大の深さ
    pub max_depth: usize,
}

/// 相互に依存する状態機械の実行器
///
/// 実装側はフレームからカーソルを作る方法と、カーソルを1段進める方法だけを
/// 与える。スタックの管理は `run_recursion` が行う。
pub trait RecursionRunner {
    type Frame;
    type Cursor;
    type Error;

    /// フレームを判別子で振り分けて、新しいカーソルを作る
    fn start(&mut self, frame: Self::Frame) -> Result<Self::Cursor, Self::Error>;

    /// カーソルを次の中断点か完了まで進める
    fn resume(&mut self, cursor: &mut Self::Cursor) -> Result<Step<Self::Frame>, Self::Error>;

    fn run_recursion(&mut self, frame: Self::Frame) -> Result<RunStats, Self::Error> {
        let mut stats = RunStats {
            calls: 1,
            ..RunStats::default()
        };
        let mut stack: Vec<Self::Cursor> = Vec::new();
        let mut current = self.start(frame)?;

        loop {
            stats.steps += 1;
            match self.resume(&mut current)? {
                Step::Call(child) => {
                    let next = self.start(child)?;
                    stack.push(std::mem::replace(&mut current, next));
                    stats.calls += 1;
                    stats.max_depth = stats.max_depth.max(stack.len());
                    trace!("push: depth {}", stack.len());
                }
                Step::Return => match stack.pop() {
                    Some(parent) => {
                        current = parent;
                        trace!("pop: depth {}", stack.len());
                    }
                    None => break,
                },
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 手書きの階乗: フレームは n、カーソルは (n, 子を呼んだか)
    struct Factorial {
        result: u64,
    }

    impl RecursionRunner for Factorial {
        type Frame = u64;
        type Cursor = (u64, bool);
        type Error = String;

        fn start(&mut self, frame: u64) -> Result<(u64, bool), String> {
            Ok((frame, false))
        }

        fn resume(&mut self, cursor: &mut (u64, bool)) -> Result<Step<u64>, String> {
            let (n, called) = *cursor;
            if n <= 1 {
                self.result = 1;
                return Ok(Step::Return);
            }
            if !called {
                cursor.1 = true;
                return Ok(Step::Call(n - 1));
            }
            self.result = self.result.checked_mul(n).ok_or("overflow")?;
            Ok(Step::Return)
        }
    }

    #[test]
    fn test_factorial_by_hand() {
        let mut runner = Factorial { result: 0 };
        let stats = runner.run_recursion(10).unwrap();
        assert_eq!(runner.result, 3_628_800);
        assert_eq!(stats.calls, 10);
        assert_eq!(stats.max_depth, 9);
    }

    #[test]
    fn test_error_stops_the_run() {
        let mut runner = Factorial { result: 0 };
        assert_eq!(runner.run_recursion(30), Err("overflow".to_string()));
    }
}
