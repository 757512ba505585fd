//! 解析モジュール
//!
//! このモジュールは名前解決、変換対象の関数の発見とグループ化、
//! 再帰呼び出し箇所の分類を行います。

mod classifier;
mod groups;
mod resolver;
mod symbol;

// 公開API
pub use classifier::{
    classify, CallSite, CallSiteClassifier, CallSiteKind, NodesToReplace, ReturnSite,
};
pub use groups::{
    collect_groups, GroupKey, GroupMembers, MemberInfo, RecursionGroup, RecursiveFunction,
};
pub use resolver::Resolver;
pub use symbol::{FunctionSignature, FunctionTable};
