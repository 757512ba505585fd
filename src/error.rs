//! 統一的なエラーハンドリングモジュール
//!
//! このモジュールは、saferec 全体で使用されるエラー型と、
//! 変換パスが報告する診断情報（エラー・警告・ログ）の収集機構を提供します。

use crate::ast::Span;
use crate::runtime::Value;
use codespan_reporting::diagnostic::{Diagnostic as CsDiagnostic, Label};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// saferec の統一エラー型
#[derive(Error, Debug, Clone)]
pub enum SafeRecError {
    /// レキサーエラー
    #[error("字句解析エラー: {0}")]
    Lexer(#[from] LexerError),

    /// パーサーエラー
    #[error("構文解析エラー: {0}")]
    Parser(#[from] ParserError),

    /// 名前解決エラー
    #[error("名前解決エラー: {0}")]
    Resolve(#[from] ResolveError),

    /// 変換エラー
    #[error("変換エラー: {0}")]
    Transform(#[from] TransformError),

    /// 実行時エラー
    #[error("実行時エラー: {0}")]
    Runtime(#[from] RuntimeError),

    /// ファイルI/Oエラー
    #[error("ファイル操作エラー: {0}")]
    Io(String),

    /// その他のエラー
    #[error("{0}")]
    Other(String),
}

/// レキサーエラーの詳細
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexerError {
    #[error("認識できないトークン: '{token}'")]
    UnrecognizedToken { token: String, span: Span },
}

/// パーサーエラーの詳細
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParserError {
    #[error("予期しないトークン: {expected}を期待しましたが、{found}が見つかりました")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("予期しない入力の終了: {expected}を期待していました")]
    UnexpectedEof { expected: String, span: Span },

    #[error("不正な構文: {message}")]
    InvalidSyntax { message: String, span: Span },
}

/// 名前解決エラーの詳細
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("未定義の関数: {name}")]
    UndefinedFunction { name: String, span: Span },

    #[error("関数 {name} は既に定義されています")]
    DuplicateFunction { name: String, span: Span },

    #[error("{name} の引数の数が一致しません: {expected}個を期待しましたが、{found}個が見つかりました")]
    ArgumentCountMismatch {
        name: String,
        expected: usize,
        found: usize,
        span: Span,
    },

    #[error("`this` はレシーバ（先頭パラメータ）にしか付けられません: {name}")]
    MisplacedReceiver { name: String, span: Span },
}

/// 変換パスのエラー
///
/// `Unsupported` は対象の関数（グループ）だけを諦める通常の失敗、
/// `Internal` は変換器自身のバグを意味する。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("未対応の構文: {message}")]
    Unsupported { message: String, span: Span },

    #[error("内部エラー: {message}")]
    Internal { message: String, span: Option<Span> },
}

impl TransformError {
    pub fn internal(message: impl Into<String>) -> Self {
        TransformError::Internal {
            message: message.into(),
            span: None,
        }
    }
}

/// 実行時エラー
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("未定義の変数: {name}")]
    UndefinedVariable { name: String, span: Span },

    #[error("型エラー: {message}")]
    TypeError { message: String, span: Span },

    #[error("ゼロ除算")]
    DivisionByZero { span: Span },

    #[error("整数オーバーフロー")]
    Overflow { span: Span },

    #[error("範囲外のインデックス: {index} (長さ {len})")]
    IndexOutOfBounds { index: i64, len: usize, span: Span },

    #[error("関数 {function} が値を返さずに終了しました")]
    MissingReturn { function: String },

    #[error("呼び出しの深さが上限 {limit} を超えました")]
    StackOverflow { limit: usize },

    #[error("捕捉されない例外: {value}")]
    Thrown { value: Value, span: Span },

    #[error("未定義の関数: {name}")]
    UnknownFunction { name: String },

    #[error("{name} の引数の数が一致しません: {expected}個を期待しましたが、{found}個が見つかりました")]
    ArgumentCountMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("エントリポイント {name} が曖昧です: {candidates}")]
    AmbiguousEntryPoint { name: String, candidates: String },

    #[error("不正なディスパッチ判別子: {tag}")]
    BadDispatch { tag: u32 },

    #[error("内部エラー: {message}")]
    Internal { message: String },
}

impl RuntimeError {
    pub fn span(&self) -> Option<Span> {
        match self {
            RuntimeError::UndefinedVariable { span, .. }
            | RuntimeError::TypeError { span, .. }
            | RuntimeError::DivisionByZero { span }
            | RuntimeError::Overflow { span }
            | RuntimeError::IndexOutOfBounds { span, .. }
            | RuntimeError::Thrown { span, .. } => Some(*span),
            _ => None,
        }
    }
}

impl SafeRecError {
    /// エラーに対応するソース上の位置
    pub fn span(&self) -> Option<Span> {
        match self {
            SafeRecError::Lexer(LexerError::UnrecognizedToken { span, .. }) => Some(*span),
            SafeRecError::Parser(e) => match e {
                ParserError::UnexpectedToken { span, .. }
                | ParserError::UnexpectedEof { span, .. }
                | ParserError::InvalidSyntax { span, .. } => Some(*span),
            },
            SafeRecError::Resolve(e) => match e {
                ResolveError::UndefinedFunction { span, .. }
                | ResolveError::DuplicateFunction { span, .. }
                | ResolveError::ArgumentCountMismatch { span, .. }
                | ResolveError::MisplacedReceiver { span, .. } => Some(*span),
            },
            SafeRecError::Transform(TransformError::Unsupported { span, .. }) => Some(*span),
            SafeRecError::Transform(TransformError::Internal { span, .. }) => *span,
            SafeRecError::Runtime(e) => e.span(),
            SafeRecError::Io(_) | SafeRecError::Other(_) => None,
        }
    }

    /// 診断情報に変換
    pub fn to_diagnostic(&self) -> Diagnostic {
        let (kind, message) = match self {
            SafeRecError::Transform(TransformError::Unsupported { message, .. }) => {
                (DiagnosticKind::UnsupportedSyntax, message.clone())
            }
            SafeRecError::Transform(TransformError::Internal { message, .. }) => {
                (DiagnosticKind::InternalError, message.clone())
            }
            other => (DiagnosticKind::Frontend, other.to_string()),
        };
        Diagnostic {
            severity: Severity::Error,
            kind,
            message,
            span: self.span(),
        }
    }
}

/// 診断の重要度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// 診断の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// 変換の進行状況
    Log,
    /// 字句・構文・名前解決のエラー
    Frontend,
    /// 変換できない構文（その関数・グループだけ失敗する）
    UnsupportedSyntax,
    /// 変換はするが意味が保たれない可能性のある構文
    SyntaxWarning,
    /// 設定の誤りの可能性
    ConfigurationWarning,
    /// 変換器のバグ
    InternalError,
}

impl DiagnosticKind {
    /// 診断コード
    pub fn code(self) -> &'static str {
        match self {
            DiagnosticKind::Log => "SRLog",
            DiagnosticKind::InternalError => "SR0",
            DiagnosticKind::Frontend => "SR1",
            DiagnosticKind::UnsupportedSyntax => "SR2",
            DiagnosticKind::SyntaxWarning => "SR3",
            DiagnosticKind::ConfigurationWarning => "SR4",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            DiagnosticKind::Log => Severity::Info,
            DiagnosticKind::SyntaxWarning | DiagnosticKind::ConfigurationWarning => Severity::Warning,
            DiagnosticKind::Frontend
            | DiagnosticKind::UnsupportedSyntax
            | DiagnosticKind::InternalError => Severity::Error,
        }
    }
}

/// 位置情報付きの診断
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
    pub span: Option<Span>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, span: Option<Span>, message: impl Into<String>) -> Self {
        Self {
            severity: kind.severity(),
            kind,
            message: message.into(),
            span,
        }
    }

    /// codespan-reportingのDiagnosticに変換
    pub fn to_codespan(&self, file_id: usize) -> CsDiagnostic<usize> {
        let base = match self.severity {
            Severity::Info => CsDiagnostic::note(),
            Severity::Warning => CsDiagnostic::warning(),
            Severity::Error => CsDiagnostic::error(),
        };
        let labels = self
            .span
            .map(|span| vec![Label::primary(file_id, span.start..span.end)])
            .unwrap_or_default();
        // 診断メッセージは1行に収める
        base.with_code(self.kind.code())
            .with_message(self.message.replace('\n', "\\n "))
            .with_labels(labels)
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind.code(), self.message)
    }
}

/// 診断の受け取り口
///
/// 報告は投げっぱなしで、報告側は結果を待たない。
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic);

    fn log(&mut self, span: Option<Span>, message: impl Into<String>)
    where
        Self: Sized,
    {
        self.report(Diagnostic::new(DiagnosticKind::Log, span, message));
    }

    fn unsupported_syntax(&mut self, span: Span, message: impl Into<String>)
    where
        Self: Sized,
    {
        self.report(Diagnostic::new(DiagnosticKind::UnsupportedSyntax, Some(span), message));
    }

    fn syntax_warning(&mut self, span: Span, message: impl Into<String>)
    where
        Self: Sized,
    {
        self.report(Diagnostic::new(DiagnosticKind::SyntaxWarning, Some(span), message));
    }

    fn configuration_warning(&mut self, span: Span, message: impl Into<String>)
    where
        Self: Sized,
    {
        self.report(Diagnostic::new(DiagnosticKind::ConfigurationWarning, Some(span), message));
    }

    fn internal_error(&mut self, span: Option<Span>, message: impl Into<String>)
    where
        Self: Sized,
    {
        self.report(Diagnostic::new(DiagnosticKind::InternalError, span, message));
    }
}

/// 複数の診断を蓄積するためのコレクター
#[derive(Debug, Default, Clone)]
pub struct ErrorCollector {
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
    logs: Vec<Diagnostic>,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// エラーを追加
    pub fn add_error(&mut self, error: &SafeRecError) {
        self.report(error.to_diagnostic());
    }

    /// エラーがあるかどうか
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// 警告があるかどうか
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// エラーの数
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// 警告の数
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// すべてのエラーを取得
    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    /// すべての警告を取得
    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    /// ログを取得
    pub fn logs(&self) -> &[Diagnostic] {
        &self.logs
    }

    /// 指定した種類の診断を報告順に列挙
    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.errors
            .iter()
            .chain(self.warnings.iter())
            .chain(self.logs.iter())
            .filter(move |d| d.kind == kind)
    }

    /// 別のコレクターの内容を取り込む
    pub fn extend(&mut self, other: ErrorCollector) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self.logs.extend(other.logs);
    }
}

impl DiagnosticSink for ErrorCollector {
    fn report(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => self.errors.push(diagnostic),
            Severity::Warning => self.warnings.push(diagnostic),
            Severity::Info => self.logs.push(diagnostic),
        }
    }
}

/// Result型のエイリアス
pub type SafeRecResult<T> = Result<T, SafeRecError>;

impl From<std::io::Error> for SafeRecError {
    fn from(e: std::io::Error) -> Self {
        SafeRecError::Io(e.to_string())
    }
}
