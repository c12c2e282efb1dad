//! Test-script composition and execution: directive scanning,
//! substitution expansion, external and internal runners.

pub mod composer;
pub mod directives;
pub mod runner;
pub mod substitutions;

pub use composer::execute_script;
pub use directives::{parse_integrated_test_script_commands, ParserKind, ScannedDirective};
pub use runner::{
    execute_script_internal, execute_sh_test, parse_test_script, ScriptError, TestResult,
    TestStatus,
};
pub use substitutions::{
    apply_substitutions, colon_normalize_path, get_default_substitutions, SubstitutionList,
};
