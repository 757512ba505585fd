//! 変換パイプラインのメイン処理モジュール
//!
//! このモジュールは、字句解析から変換までのパイプライン全体を管理し、
//! 複数のエラーを蓄積しながら処理を進める機能を提供します。

use crate::analyzer::{FunctionTable, Resolver};
use crate::ast::Program;
use crate::codegen::{CodeGenerator, GeneratedUnit};
use crate::error::{ErrorCollector, LexerError, SafeRecError, SafeRecResult};
use crate::lexer::{Lexer, Token, TokenWithPosition};
use crate::parser::Parser;
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term::termcolor::{ColorChoice, NoColor, StandardStream};
use log::debug;
use std::fs;
use std::path::Path;

/// コンパイル状態を管理する構造体
pub struct CompilationState {
    pub source_file: String,
    pub source: String,
    pub files: SimpleFiles<String, String>,
    pub file_id: usize,
    pub error_collector: ErrorCollector,
}

impl CompilationState {
    /// 新しいコンパイル状態を作成
    pub fn new<P: AsRef<Path>>(source_file: P) -> SafeRecResult<Self> {
        let source_file_str = source_file.as_ref().display().to_string();
        let source = fs::read_to_string(source_file.as_ref())
            .map_err(|e| SafeRecError::Io(format!("Failed to read source file: {}", e)))?;
        Ok(Self::new_from_string(&source_file_str, source))
    }

    /// 文字列からコンパイル状態を作成
    pub fn new_from_string(filename: &str, source: String) -> Self {
        let mut files = SimpleFiles::new();
        let file_id = files.add(filename.to_string(), source.clone());

        Self {
            source_file: filename.to_string(),
            source,
            files,
            file_id,
            error_collector: ErrorCollector::new(),
        }
    }

    /// エラーを追加
    pub fn add_error(&mut self, error: &SafeRecError) {
        self.error_collector.add_error(error);
    }

    /// 診断情報を標準エラー出力に報告
    pub fn report_diagnostics(&self) -> SafeRecResult<()> {
        let writer = StandardStream::stderr(ColorChoice::Auto);
        let mut lock = writer.lock();
        self.emit_diagnostics(&mut lock)
    }

    /// 診断情報を色なしの文字列にする
    pub fn render_diagnostics(&self) -> SafeRecResult<String> {
        let mut buffer = NoColor::new(Vec::new());
        self.emit_diagnostics(&mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer.into_inner()).into_owned())
    }

    fn emit_diagnostics(&self, writer: &mut dyn codespan_reporting::term::termcolor::WriteColor) -> SafeRecResult<()> {
        let config = codespan_reporting::term::Config::default();

        // エラー、警告の順に報告
        for diagnostic in self
            .error_collector
            .errors()
            .iter()
            .chain(self.error_collector.warnings())
        {
            let diagnostic = diagnostic.to_codespan(self.file_id);
            codespan_reporting::term::emit(writer, &config, &self.files, &diagnostic)
                .map_err(|e| SafeRecError::Io(format!("Failed to emit diagnostic: {}", e)))?;
        }

        Ok(())
    }

    /// エラーがあるかチェック
    pub fn has_errors(&self) -> bool {
        self.error_collector.has_errors()
    }

    /// エラー数を取得
    pub fn error_count(&self) -> usize {
        self.error_collector.error_count()
    }
}

/// パイプラインの成果物
#[derive(Debug, Clone)]
pub struct CompilationOutput {
    pub program: Program,
    pub functions: FunctionTable,
    pub units: Vec<GeneratedUnit>,
}

/// 変換パイプライン
pub struct CompilationPipeline {
    state: CompilationState,
}

impl CompilationPipeline {
    /// 新しいパイプラインを作成
    pub fn new(state: CompilationState) -> Self {
        Self { state }
    }

    /// ソース文字列から直接作成
    pub fn from_source(filename: &str, source: impl Into<String>) -> Self {
        Self::new(CompilationState::new_from_string(filename, source.into()))
    }

    /// コンパイル状態への参照を取得
    pub fn state(&self) -> &CompilationState {
        &self.state
    }

    /// 状態への可変参照を取得
    pub fn state_mut(&mut self) -> &mut CompilationState {
        &mut self.state
    }

    pub fn into_state(self) -> CompilationState {
        self.state
    }

    /// 診断の一覧
    pub fn diagnostics(&self) -> &ErrorCollector {
        &self.state.error_collector
    }

    /// レキシカル解析を実行
    pub fn tokenize(&mut self) -> Vec<TokenWithPosition> {
        debug!("ステップ: レキシカル解析を開始");

        let tokens = Lexer::new(&self.state.source).collect_tokens();

        // レキサーエラーをチェック
        for token in &tokens {
            if matches!(token.token, Token::Error) {
                let text = self
                    .state
                    .source
                    .get(token.span.clone())
                    .unwrap_or("不明")
                    .to_string();
                self.state.add_error(&SafeRecError::Lexer(LexerError::UnrecognizedToken {
                    token: text,
                    span: token.span.clone().into(),
                }));
            }
        }

        tokens
    }

    /// 構文解析を実行
    pub fn parse(&mut self, tokens: Vec<TokenWithPosition>) -> Option<Program> {
        debug!("ステップ: 構文解析を開始");

        let tokens = tokens
            .into_iter()
            .filter(|t| !matches!(t.token, Token::Error))
            .collect();
        let mut parser = Parser::new(tokens);
        match parser.parse() {
            Ok(program) => Some(program),
            Err(e) => {
                self.state.add_error(&SafeRecError::Parser(e));
                None
            }
        }
    }

    /// 名前解決を実行
    pub fn resolve(&mut self, program: &mut Program) -> Option<FunctionTable> {
        debug!("ステップ: 名前解決を開始");

        match Resolver::new().resolve(program) {
            Ok(table) => Some(table),
            Err(errors) => {
                for e in errors {
                    self.state.add_error(&SafeRecError::Resolve(e));
                }
                None
            }
        }
    }

    /// 再帰関数の変換を実行
    pub fn transform(&mut self, program: &Program) -> Vec<GeneratedUnit> {
        debug!("ステップ: 再帰関数の変換を開始");

        CodeGenerator::new().generate_all(program, &mut self.state.error_collector)
    }

    /// 診断を報告せずにパイプライン全体を実行
    ///
    /// 字句・構文・名前解決でエラーがあれば `None`。変換の失敗はグループ単位なので、
    /// 変換できたグループの成果物は返る
    pub fn process(&mut self) -> Option<CompilationOutput> {
        let tokens = self.tokenize();

        // 字句エラーがあっても構文解析は続行（より多くのエラーを検出するため）
        let mut program = self.parse(tokens)?;
        let functions = self.resolve(&mut program)?;
        if self.state.has_errors() {
            return None;
        }

        let units = self.transform(&program);
        Some(CompilationOutput {
            program,
            functions,
            units,
        })
    }

    /// エラーレポートを生成
    pub fn report_errors(&self) -> SafeRecResult<()> {
        self.state.report_diagnostics()?;

        if self.state.has_errors() {
            eprintln!(
                "\n変換エラー: {} 個のエラーが見つかりました",
                self.state.error_count()
            );
        }

        Ok(())
    }

    /// パイプライン全体を実行し、診断を報告する
    pub fn run(&mut self) -> SafeRecResult<Option<CompilationOutput>> {
        let output = self.process();
        self.report_errors()?;
        Ok(output)
    }
}
